//! Hyper adapter.
//!
//! [`HyperDriver`] serves registered actions over hyper. Routes are matched in
//! registration order against the compiled route pattern; global middlewares
//! are mounted at the route prefix. Each route runs its `use` middlewares,
//! parses the body, checks authorization and parses uploads before handing
//! the request to the engine.
//!
//! ```rust,ignore
//! let driver = HyperDriver::new().body_limit(2 * 1024 * 1024);
//! let mut engine = RoutingControllers::new(driver, global_store(), RoutingDefaults::default());
//! engine.register_controllers(None)?;
//! engine.into_driver().serve("127.0.0.1:8080").await?;
//! ```

mod server;
mod test_client;
mod upload;

pub use test_client::{TestClient, TestRequest, TestResponse};
pub use upload::{Multipart, MultipartConfig, MultipartParser, DEFAULT_MAX_FIELDS, DEFAULT_MAX_SIZE};

use crate::adapter::{Adapter, DriverSettings, ExecuteCallback};
use crate::context::{RequestContext, Response};
use crate::error::{HttpError, Result, RoutingError};
use crate::metadata::{ActionMetadata, ControllerMetadata, MiddlewareMetadata, MiddlewarePhase, ParamKind, ParamMetadata};
use crate::middleware::{Middleware, MiddlewareHandle};
use crate::route::{Route, Verb};
use crate::value::Output;
use async_trait::async_trait;
use bytes::Bytes;
use cookie::Cookie;
use http::header::{CONTENT_TYPE, COOKIE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::Full;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, warn};

/// Default maximum request body size (1MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";
const BINARY: &str = "application/octet-stream";

/// Renders templates for actions declared with a rendered template.
pub trait TemplateRenderer: Send + Sync + 'static {
    fn render(&self, template: &str, context: &Value) -> std::result::Result<String, HttpError>;
}

struct MountedMiddleware {
    name: String,
    middleware: Arc<dyn Middleware>,
}

struct RouteEntry {
    verb: Verb,
    pattern: Regex,
    action: Arc<ActionMetadata>,
    before: Vec<MiddlewareHandle>,
    after: Vec<MiddlewareHandle>,
    execute: ExecuteCallback<HyperDriver>,
}

impl RouteEntry {
    fn accepts(&self, method: &Method) -> bool {
        self.verb.matches(method) || (*method == Method::HEAD && self.verb == Verb::Get)
    }

    /// Named captures of `path`, percent-decoded.
    fn captures(&self, path: &str) -> Option<Result<HashMap<String, String>>> {
        let captures = self.pattern.captures(path)?;
        let params = self
            .pattern
            .capture_names()
            .flatten()
            .filter_map(|name| captures.name(name).map(|m| (name, m.as_str())))
            .map(|(name, raw)| {
                percent_decode_str(raw)
                    .decode_utf8()
                    .map(|value| (name.to_string(), value.into_owned()))
                    .map_err(|e| RoutingError::Extraction {
                        param: name.to_string(),
                        message: e.to_string(),
                    })
            })
            .collect();
        Some(params)
    }
}

/// Request body parser shared by every action that reads the body.
#[derive(Debug, Clone)]
struct BodyParser {
    limit: usize,
}

impl BodyParser {
    fn parse(&self, ctx: &RequestContext, action: &ActionMetadata) -> Result<Option<Value>> {
        let limit = action_body_limit(action).unwrap_or(self.limit);

        let body = ctx.body();
        if body.len() > limit {
            return Err(RoutingError::Middleware(HttpError::payload_too_large(format!(
                "Request body exceeds {} bytes",
                limit
            ))));
        }
        if body.is_empty() {
            return Ok(None);
        }

        let content_type = ctx.header(CONTENT_TYPE.as_str()).unwrap_or_default();
        if content_type.starts_with("multipart/") {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(body);
        if action.is_json_typed || content_type.contains("json") {
            serde_json::from_slice(body)
                .map(Some)
                .map_err(|_| RoutingError::InvalidJson {
                    param: "body".to_string(),
                    value: text.into_owned(),
                })
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            urlencoded_map(&text)
                .map(|form| Some(Value::Object(form)))
                .map_err(|e| RoutingError::Extraction {
                    param: "body".to_string(),
                    message: e.to_string(),
                })
        } else {
            Ok(Some(Value::String(text.into_owned())))
        }
    }
}

/// Body size override declared in the body parameter's options.
fn action_body_limit(action: &ActionMetadata) -> Option<usize> {
    action
        .body_extra_options
        .as_ref()
        .and_then(|options| options.get("limit"))
        .and_then(Value::as_u64)
        .map(|limit| limit as usize)
}

/// Adapter serving actions over hyper.
pub struct HyperDriver {
    settings: DriverSettings,
    routes: Vec<RouteEntry>,
    before: Vec<MountedMiddleware>,
    after: Vec<MountedMiddleware>,
    body_limit: usize,
    /// Largest per-action body limit seen during registration
    route_body_limit: usize,
    multipart_config: MultipartConfig,
    body_parser: OnceLock<BodyParser>,
    multipart_parser: OnceLock<MultipartParser>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Default for HyperDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperDriver {
    pub fn new() -> Self {
        Self::with_settings(DriverSettings::default())
    }

    pub fn with_settings(settings: DriverSettings) -> Self {
        Self {
            settings,
            routes: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
            route_body_limit: 0,
            multipart_config: MultipartConfig::default(),
            body_parser: OnceLock::new(),
            multipart_parser: OnceLock::new(),
            renderer: None,
        }
    }

    /// Maximum request body size.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn multipart(mut self, config: MultipartConfig) -> Self {
        self.multipart_config = config;
        self
    }

    pub fn renderer<R: TemplateRenderer>(mut self, renderer: R) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Cap applied while reading a body, before any route is matched.
    ///
    /// Actions may raise their own limit above the driver default, so the
    /// cap is the largest of them; [`BodyParser`] enforces the per-action value.
    pub(super) fn read_limit(&self) -> usize {
        self.body_limit.max(self.route_body_limit)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Handle one request through middlewares and routes.
    pub async fn handle(&self, request: http::Request<Bytes>) -> Response {
        let mut ctx = RequestContext::from_request(request);
        self.dispatch(&mut ctx).await;

        if let Some(mut response) = ctx.take_response() {
            if *ctx.method() == Method::HEAD {
                *response.body_mut() = Full::new(Bytes::new());
            }
            return response;
        }
        let error = HttpError::not_found(format!("No route found for {} {}", ctx.method(), ctx.path()));
        let body = Bytes::from(error.to_json(self.settings.development).to_string());
        respond(StatusCode::NOT_FOUND, HeaderMap::new(), Some(JSON), body)
    }

    async fn dispatch(&self, ctx: &mut RequestContext) {
        let mounted = self.is_mounted(ctx.path());
        if mounted && !self.run_global(&self.before, MiddlewarePhase::Before, ctx).await {
            return;
        }

        let method = ctx.method().clone();
        let path = ctx.path().to_string();
        for route in &self.routes {
            if !route.accepts(&method) {
                continue;
            }
            let params = match route.captures(&path) {
                Some(Ok(params)) => params,
                Some(Err(err)) => {
                    self.handle_error(err, Some(route.action.as_ref()), ctx).await;
                    break;
                }
                None => continue,
            };
            ctx.set_path_params(params);
            self.run_route(route, ctx).await;
            if ctx.execution_started() || ctx.is_emitted() {
                break;
            }
        }

        if mounted && !ctx.is_failed() {
            self.run_global(&self.after, MiddlewarePhase::After, ctx).await;
        }
    }

    /// Run global middlewares. Returns `false` once the request has ended.
    async fn run_global(&self, middlewares: &[MountedMiddleware], phase: MiddlewarePhase, ctx: &mut RequestContext) -> bool {
        for mounted in middlewares {
            if let Err(err) = mounted.middleware.handle(ctx).await {
                debug!(middleware = %mounted.name, "Global middleware failed");
                self.handle_error(RoutingError::Middleware(err), None, ctx).await;
                return false;
            }
            if phase == MiddlewarePhase::Before && ctx.is_emitted() {
                return false;
            }
        }
        true
    }

    async fn run_route(&self, route: &RouteEntry, ctx: &mut RequestContext) {
        let action = route.action.as_ref();

        for handle in &route.before {
            if let Err(err) = self.run_use(handle, ctx).await {
                self.handle_error(err, Some(action), ctx).await;
                return;
            }
            if ctx.is_emitted() {
                return;
            }
        }

        if let Err(err) = self.prepare(action, ctx).await {
            self.handle_error(err, Some(action), ctx).await;
            return;
        }

        (route.execute)(self, ctx).await;
        if ctx.is_failed() {
            return;
        }

        for handle in &route.after {
            if let Err(err) = self.run_use(handle, ctx).await {
                self.handle_error(err, Some(action), ctx).await;
                return;
            }
        }
    }

    async fn run_use(&self, handle: &MiddlewareHandle, ctx: &mut RequestContext) -> Result<()> {
        let middleware = handle.resolve(self.settings.container.as_ref(), Some(&*ctx))?;
        middleware.handle(ctx).await.map_err(RoutingError::Middleware)
    }

    /// Body parsing, authorization and upload parsing for one action.
    async fn prepare(&self, action: &ActionMetadata, ctx: &mut RequestContext) -> Result<()> {
        let reads_body = action.is_body_used || action.is_file_used || action.is_files_used;
        if !reads_body && ctx.body().len() > self.body_limit {
            return Err(RoutingError::Middleware(HttpError::payload_too_large(format!(
                "Request body exceeds {} bytes",
                self.body_limit
            ))));
        }
        if action.is_body_used {
            if let Some(body) = self.body_parser().parse(ctx, action)? {
                ctx.set_parsed_body(body);
            }
        }
        if action.is_authorized_used {
            self.authorize(action, ctx).await?;
        }
        if action.is_file_used || action.is_files_used {
            self.parse_uploads(action, ctx)?;
        }
        Ok(())
    }

    async fn authorize(&self, action: &ActionMetadata, ctx: &RequestContext) -> Result<()> {
        let checker = self.settings.authorization_checker.as_ref().ok_or_else(|| {
            RoutingError::configuration(format!(
                "{} requires authorization but no authorization checker is configured",
                action.display_name()
            ))
        })?;

        let allowed = checker
            .check(ctx, &action.authorized_roles)
            .await
            .map_err(RoutingError::Handler)?;
        if allowed {
            return Ok(());
        }

        let method = ctx.method().to_string();
        let path = ctx.path().to_string();
        if action.authorized_roles.is_empty() {
            Err(RoutingError::AuthorizationRequired { method, path })
        } else {
            Err(RoutingError::AccessDenied { method, path })
        }
    }

    fn parse_uploads(&self, action: &ActionMetadata, ctx: &mut RequestContext) -> Result<()> {
        let is_multipart = ctx
            .header(CONTENT_TYPE.as_str())
            .map_or(false, |ct| ct.starts_with("multipart/form-data"));
        if !is_multipart {
            return Ok(());
        }

        let options = action
            .params
            .iter()
            .filter(|param| matches!(param.kind, ParamKind::File | ParamKind::Files))
            .find_map(|param| param.extra_options.as_ref());
        let custom;
        let parser = match options {
            Some(options) => {
                let config: MultipartConfig = serde_json::from_value(options.clone()).map_err(|e| {
                    RoutingError::configuration(format!(
                        "Invalid upload options on {}: {}",
                        action.display_name(),
                        e
                    ))
                })?;
                custom = MultipartParser::new(config);
                &custom
            }
            None => self.multipart_parser(),
        };

        let multipart = parser
            .parse(ctx.header(CONTENT_TYPE.as_str()), ctx.body())
            .map_err(RoutingError::Middleware)?;
        ctx.set_files(multipart.files);
        if ctx.parsed_body().is_none() && !multipart.fields.is_empty() {
            ctx.set_parsed_body(Value::Object(multipart.fields));
        }
        Ok(())
    }

    fn body_parser(&self) -> &BodyParser {
        self.body_parser.get_or_init(|| BodyParser { limit: self.body_limit })
    }

    fn multipart_parser(&self) -> &MultipartParser {
        self.multipart_parser
            .get_or_init(|| MultipartParser::new(self.multipart_config.clone()))
    }

    fn is_mounted(&self, path: &str) -> bool {
        let prefix = self.settings.route_prefix.trim_end_matches('/');
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    fn transform_result(&self, result: Output, action: &ActionMetadata) -> Result<Output> {
        let Output::Value(value) = result else {
            return Ok(result);
        };
        let enabled = action
            .options
            .transform_response
            .unwrap_or(self.settings.class_transformer);
        if !enabled || !(value.is_object() || value.is_array()) {
            return Ok(Output::Value(value));
        }

        let options = action
            .response_class_transform
            .as_ref()
            .unwrap_or(&self.settings.class_to_plain_options);
        let value = match &action.response_model {
            Some(model) => model
                .to_plain(value, options)
                .map_err(|message| RoutingError::Transform {
                    param: "result".to_string(),
                    target: model.name().to_string(),
                    message,
                })?,
            None => options.apply(value),
        };
        Ok(Output::Value(value))
    }
}

#[async_trait]
impl Adapter for HyperDriver {
    fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut DriverSettings {
        &mut self.settings
    }

    fn register_middleware(&mut self, metadata: &MiddlewareMetadata) -> Result<()> {
        let middleware = metadata.handle.resolve(self.settings.container.as_ref(), None)?;
        let mounted = MountedMiddleware {
            name: metadata.handle.name().to_string(),
            middleware,
        };
        debug!(middleware = %mounted.name, phase = ?metadata.phase, "Mounted global middleware");
        match metadata.phase {
            MiddlewarePhase::Before => self.before.push(mounted),
            MiddlewarePhase::After => self.after.push(mounted),
        }
        Ok(())
    }

    fn register_action(
        &mut self,
        controller: &ControllerMetadata,
        action: Arc<ActionMetadata>,
        execute: ExecuteCallback<Self>,
    ) -> Result<()> {
        let route = if self.settings.route_prefix.is_empty() {
            action.full_route.clone()
        } else {
            Route::join(&Route::from(self.settings.route_prefix.as_str()), &action.full_route)
        };
        let pattern = route.compile().map_err(|e| {
            RoutingError::configuration(format!(
                "Invalid route {} on {}: {}",
                route,
                action.display_name(),
                e
            ))
        })?;

        if let Some(existing) = self
            .routes
            .iter()
            .find(|entry| entry.verb == action.verb && entry.pattern.as_str() == pattern.as_str())
        {
            warn!(
                route = %route,
                existing = %existing.action.display_name(),
                action = %action.display_name(),
                "Duplicate route, the first registration wins"
            );
        }

        if let Some(limit) = action_body_limit(&action) {
            self.route_body_limit = self.route_body_limit.max(limit);
        }
        if action.is_file_used || action.is_files_used {
            let upload_limit = action
                .params
                .iter()
                .filter(|param| matches!(param.kind, ParamKind::File | ParamKind::Files))
                .find_map(|param| param.extra_options.as_ref()?.get("max_size")?.as_u64())
                .map_or(self.multipart_config.max_size, |limit| limit as usize);
            self.route_body_limit = self.route_body_limit.max(upload_limit);
        }

        let uses = controller.uses.iter().chain(&action.uses);
        let (after, before): (Vec<_>, Vec<_>) = uses.partition(|use_| use_.after);
        self.routes.push(RouteEntry {
            verb: action.verb,
            pattern,
            before: before.into_iter().map(|use_| use_.handle.clone()).collect(),
            after: after.into_iter().map(|use_| use_.handle.clone()).collect(),
            action,
            execute,
        });
        Ok(())
    }

    async fn get_param_from_request(&self, ctx: &RequestContext, param: &ParamMetadata) -> Result<Option<Value>> {
        let name = param.name.as_deref().unwrap_or_default();
        let value = match param.kind {
            ParamKind::Body => ctx.parsed_body().cloned(),
            ParamKind::BodyParam => ctx.parsed_body().and_then(|body| body.get(name)).cloned(),
            ParamKind::Param => ctx.path_param(name).map(|v| Value::String(v.to_string())),
            ParamKind::Params => Some(Value::Object(
                ctx.path_params()
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            )),
            ParamKind::Query => query_map(ctx, param)?.remove(name),
            ParamKind::Queries => Some(Value::Object(query_map(ctx, param)?)),
            ParamKind::Header => ctx
                .header(&name.to_ascii_lowercase())
                .map(|v| Value::String(v.to_string())),
            ParamKind::Headers => Some(Value::Object(header_map(ctx.headers()))),
            ParamKind::Cookie => cookie_map(ctx, param)?.and_then(|mut cookies| cookies.remove(name)),
            ParamKind::Cookies => Some(Value::Object(cookie_map(ctx, param)?.unwrap_or_default())),
            ParamKind::Session => ctx.session().cloned(),
            ParamKind::SessionParam => ctx.session().and_then(|session| session.get(name)).cloned(),
            ParamKind::State => match &param.name {
                Some(name) => ctx.state().get(name).cloned(),
                None => Some(Value::Object(ctx.state().clone())),
            },
            ParamKind::File => match ctx.files(name).first() {
                Some(file) => Some(serde_json::to_value(file).map_err(|e| extraction(param, e))?),
                None => None,
            },
            ParamKind::Files => {
                let files = ctx.files(name);
                if files.is_empty() {
                    None
                } else {
                    Some(serde_json::to_value(files).map_err(|e| extraction(param, e))?)
                }
            }
            ParamKind::CurrentUser | ParamKind::Custom => None,
        };
        Ok(value)
    }

    async fn handle_success(&self, result: Output, action: &ActionMetadata, ctx: &mut RequestContext) -> Result<()> {
        if ctx.is_emitted() {
            return Ok(());
        }

        let result = self.transform_result(result, action)?;
        let status = match &result {
            Output::Undefined => action
                .undefined_result
                .as_ref()
                .map(|on| on.resolve(&*ctx))
                .transpose()
                .map_err(RoutingError::Handler)?,
            Output::Value(Value::Null) => Some(match &action.null_result {
                Some(on) => on.resolve(&*ctx).map_err(RoutingError::Handler)?,
                None => StatusCode::NO_CONTENT,
            }),
            _ => None,
        };
        let status = status.or(action.success_http_code).unwrap_or(StatusCode::OK);
        let headers = action_headers(action)?;

        let response = if let Some(redirect) = &action.redirect {
            let location = match &result {
                Output::Value(Value::String(target)) => target.clone(),
                Output::Value(Value::Object(values)) => template_url(redirect, values),
                _ => redirect.clone(),
            };
            let mut headers = headers;
            let location = HeaderValue::from_str(&location)
                .map_err(|_| RoutingError::Handler(HttpError::internal("Redirect target is not a valid header value")))?;
            headers.insert(LOCATION, location);
            respond(StatusCode::FOUND, headers, None, Bytes::new())
        } else if let Some(template) = &action.rendered_template {
            let renderer = self.renderer.as_ref().ok_or_else(|| {
                RoutingError::configuration(format!(
                    "{} renders template '{}' but no template renderer is configured",
                    action.display_name(),
                    template
                ))
            })?;
            let context = match &result {
                Output::Value(value) if value.is_object() || value.is_array() => value.clone(),
                _ => Value::Object(Map::new()),
            };
            let html = renderer.render(template, &context).map_err(RoutingError::Handler)?;
            respond(status, headers, Some(HTML), Bytes::from(html))
        } else {
            match result {
                Output::Undefined if action.undefined_result.is_none() => return Err(RoutingError::NotFound),
                Output::Undefined => respond(status, headers, None, Bytes::new()),
                Output::Value(Value::Null) if action.is_json_typed && !is_bodiless(status) => {
                    respond(status, headers, Some(JSON), Bytes::from_static(b"null"))
                }
                Output::Value(Value::Null) => respond(status, headers, None, Bytes::new()),
                Output::Binary(bytes) => respond(status, headers, Some(BINARY), bytes),
                Output::Value(Value::String(text)) if !action.is_json_typed => {
                    respond(status, headers, Some(HTML), Bytes::from(text))
                }
                Output::Value(value) => {
                    let body = serde_json::to_vec(&value)
                        .map_err(|e| RoutingError::Handler(HttpError::from(e)))?;
                    respond(status, headers, Some(JSON), Bytes::from(body))
                }
            }
        };

        ctx.emit(response);
        Ok(())
    }

    async fn handle_error(&self, error: RoutingError, action: Option<&ActionMetadata>, ctx: &mut RequestContext) {
        ctx.mark_failed();
        let status = error.status();
        let name = action.map(ActionMetadata::display_name);
        if status.is_server_error() {
            error!(error = %error, action = ?name, method = %ctx.method(), path = %ctx.path(), "Request failed");
        } else {
            debug!(error = %error, action = ?name, status = status.as_u16(), "Request rejected");
        }

        if ctx.is_emitted() {
            debug!("Response already emitted, dropping error response");
            return;
        }
        if !self.settings.default_error_handler {
            ctx.emit(respond(status, HeaderMap::new(), None, Bytes::new()));
            return;
        }

        let headers = match action.map(action_headers).transpose() {
            Ok(headers) => headers.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "Skipping invalid action headers on error response");
                HeaderMap::new()
            }
        };
        let development = self.settings.development;
        let http_error = error.into_http_error();
        let response = if action.map_or(false, |action| action.is_json_typed) {
            let body = Bytes::from(http_error.to_json(development).to_string());
            respond(status, headers, Some(JSON), body)
        } else {
            respond(status, headers, Some(TEXT), Bytes::from(http_error.to_text(development)))
        };
        ctx.emit(response);
    }
}

fn respond(status: StatusCode, headers: HeaderMap, content_type: Option<&'static str>, body: Bytes) -> Response {
    let body = if is_bodiless(status) { Bytes::new() } else { body };
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if let Some(content_type) = content_type {
        if !response.headers().contains_key(CONTENT_TYPE) {
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
    response
}

fn is_bodiless(status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

fn action_headers(action: &ActionMetadata) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &action.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RoutingError::configuration(format!("Invalid header name '{}': {}", name, e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| RoutingError::configuration(format!("Invalid value for header '{}': {}", name, e)))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Fill `:key` placeholders of a redirect template from `values`.
fn template_url(template: &str, values: &Map<String, Value>) -> String {
    let mut url = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(position) = rest.find(':') {
        url.push_str(&rest[..position]);
        let after = &rest[position + 1..];
        let end = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let key = &after[..end];
        match values.get(key) {
            Some(Value::String(s)) if !key.is_empty() => url.push_str(s),
            Some(value) if !key.is_empty() => url.push_str(&value.to_string()),
            _ => {
                url.push(':');
                url.push_str(key);
            }
        }
        rest = &after[end..];
    }
    url.push_str(rest);
    url
}

fn extraction(param: &ParamMetadata, error: impl std::fmt::Display) -> RoutingError {
    RoutingError::Extraction {
        param: param.display_name().to_string(),
        message: error.to_string(),
    }
}

/// Insert `value` under `key`, collecting repeated keys into an array.
pub(crate) fn push_value(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn urlencoded_map(input: &str) -> std::result::Result<Map<String, Value>, serde_urlencoded::de::Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(input)?;
    let mut map = Map::new();
    for (key, value) in pairs {
        push_value(&mut map, key, Value::String(value));
    }
    Ok(map)
}

fn query_map(ctx: &RequestContext, param: &ParamMetadata) -> Result<Map<String, Value>> {
    urlencoded_map(ctx.query_string().unwrap_or_default()).map_err(|e| extraction(param, e))
}

fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    let mut map = Map::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        map.insert(name.as_str().to_string(), Value::String(values.join(", ")));
    }
    map
}

/// Cookies sent with the request; `None` without a `Cookie` header.
fn cookie_map(ctx: &RequestContext, param: &ParamMetadata) -> Result<Option<Map<String, Value>>> {
    let headers: Vec<&str> = ctx
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if headers.is_empty() {
        return Ok(None);
    }

    let mut cookies = Map::new();
    for cookie in Cookie::split_parse(headers.join("; ")) {
        let cookie = cookie.map_err(|e| extraction(param, e))?;
        cookies.insert(cookie.name().to_string(), Value::String(cookie.value().to_string()));
    }
    Ok(Some(cookies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redirect_templates_are_filled() {
        let values = json!({"id": 7, "slug": "intro"});
        let values = values.as_object().unwrap();
        assert_eq!(template_url("/posts/:id/:slug", values), "/posts/7/intro");
        assert_eq!(template_url("/posts/:missing", values), "/posts/:missing");
        assert_eq!(template_url("http://host:8080/:id", values), "http://host:8080/7");
    }

    #[test]
    fn repeated_query_keys_collect_into_arrays() {
        let map = urlencoded_map("tag=a&tag=b&tag=c&page=2").unwrap();
        assert_eq!(map["tag"], json!(["a", "b", "c"]));
        assert_eq!(map["page"], json!("2"));
    }

    #[test]
    fn route_prefix_mounting() {
        let mut driver = HyperDriver::new();
        assert!(driver.is_mounted("/anything"));

        driver.settings_mut().route_prefix = "/api".to_string();
        assert!(driver.is_mounted("/api"));
        assert!(driver.is_mounted("/api/users"));
        assert!(!driver.is_mounted("/apis"));
        assert!(!driver.is_mounted("/users"));
    }

    #[test]
    fn bodiless_statuses_drop_the_body() {
        let response = respond(StatusCode::NO_CONTENT, HeaderMap::new(), Some(JSON), Bytes::from_static(b"null"));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[CONTENT_TYPE], JSON);
    }
}
