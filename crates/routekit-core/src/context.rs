//! Per-request context.
//!
//! A [`RequestContext`] wraps the request head and body together with the
//! state accumulated while the request travels through middlewares and the
//! action pipeline: matched path parameters, the parsed body, uploaded files,
//! the session and state bags populated by middlewares, and the response once
//! it has been emitted.

use bytes::Bytes;
use http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Response type emitted by adapters.
pub type Response = http::Response<Full<Bytes>>;

/// A file received in a multipart request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Name of the multipart field
    pub field_name: String,
    /// Original file name, as sent by the client
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
    /// File content, base64-encoded when serialized
    #[serde(with = "base64_bytes")]
    pub data: Bytes,
}

impl UploadedFile {
    pub fn extension(&self) -> Option<&str> {
        self.file_name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// Everything known about one incoming request.
pub struct RequestContext {
    parts: Parts,
    body: Bytes,
    parsed_body: Option<Value>,
    path_params: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
    session: Option<Value>,
    state: Map<String, Value>,
    response_headers: HeaderMap,
    response: Option<Response>,
    execution_started: bool,
    failed: bool,
}

impl RequestContext {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            parts,
            body,
            parsed_body: None,
            path_params: HashMap::new(),
            files: HashMap::new(),
            session: None,
            state: Map::new(),
            response_headers: HeaderMap::new(),
            response: None,
            execution_started: false,
            failed: false,
        }
    }

    /// Build a context from a full request.
    pub fn from_request(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts, body)
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn query_string(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Header value as text, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as parsed by the adapter's body parser
    pub fn parsed_body(&self) -> Option<&Value> {
        self.parsed_body.as_ref()
    }

    pub fn set_parsed_body(&mut self, body: Value) {
        self.parsed_body = Some(body);
    }

    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn set_path_params(&mut self, params: HashMap<String, String>) {
        self.path_params = params;
    }

    pub fn files(&self, field: &str) -> &[UploadedFile] {
        self.files.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_files(&mut self, files: HashMap<String, Vec<UploadedFile>>) {
        self.files = files;
    }

    pub fn session(&self) -> Option<&Value> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Value) {
        self.session = Some(session);
    }

    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.state
    }

    /// Add a header to whatever response is eventually emitted.
    pub fn set_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    /// Whether a response has been emitted.
    pub fn is_emitted(&self) -> bool {
        self.response.is_some()
    }

    /// Emit the response. Only the first emission is kept; later ones are
    /// ignored and reported as `false`.
    pub fn emit(&mut self, mut response: Response) -> bool {
        if self.response.is_some() {
            tracing::warn!(
                method = %self.parts.method,
                path = %self.parts.uri.path(),
                "Response already emitted, dropping second emission"
            );
            return false;
        }
        for (name, value) in self.response_headers.iter() {
            if !response.headers().contains_key(name) {
                response.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.response = Some(response);
        true
    }

    /// Status of the emitted response
    pub fn response_status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status())
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Stamp the context as executing an action. Returns `false` when an
    /// execution already started for this request.
    pub fn begin_execution(&mut self) -> bool {
        if self.execution_started {
            return false;
        }
        self.execution_started = true;
        true
    }

    pub fn execution_started(&self) -> bool {
        self.execution_started
    }

    /// Record that an error was emitted for this request.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("path_params", &self.path_params)
            .field("execution_started", &self.execution_started)
            .field("emitted", &self.response.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RequestContext {
        let request = http::Request::builder()
            .method(Method::GET)
            .uri("/users/1?full=true")
            .header("x-token", "abc")
            .body(Bytes::new())
            .unwrap();
        RequestContext::from_request(request)
    }

    fn response(status: StatusCode) -> Response {
        http::Response::builder()
            .status(status)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn exposes_request_head() {
        let ctx = context();
        assert_eq!(ctx.path(), "/users/1");
        assert_eq!(ctx.query_string(), Some("full=true"));
        assert_eq!(ctx.header("x-token"), Some("abc"));
    }

    #[test]
    fn execution_stamp_is_set_once() {
        let mut ctx = context();
        assert!(ctx.begin_execution());
        assert!(!ctx.begin_execution());
        assert!(ctx.execution_started());
    }

    #[test]
    fn only_first_emission_is_kept() {
        let mut ctx = context();
        ctx.set_response_header(
            HeaderName::from_static("x-request"),
            HeaderValue::from_static("1"),
        );
        assert!(ctx.emit(response(StatusCode::OK)));
        assert!(!ctx.emit(response(StatusCode::INTERNAL_SERVER_ERROR)));

        let response = ctx.take_response().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request"], "1");
    }

    #[test]
    fn uploaded_file_serializes_as_base64() {
        let file = UploadedFile {
            field_name: "avatar".into(),
            file_name: "me.png".into(),
            content_type: Some("image/png".into()),
            size: 3,
            data: Bytes::from_static(b"abc"),
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["data"], "YWJj");
        assert_eq!(file.extension(), Some("png"));

        let back: UploadedFile = serde_json::from_value(json).unwrap();
        assert_eq!(back.data, file.data);
    }
}
