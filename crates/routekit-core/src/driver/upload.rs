//! `multipart/form-data` parsing for file parameters.

use crate::context::UploadedFile;
use crate::error::HttpError;
use bytes::Bytes;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Maximum size of a whole multipart body (10MB)
pub const DEFAULT_MAX_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of parts in one body
pub const DEFAULT_MAX_FIELDS: usize = 100;

/// Limits for multipart bodies.
///
/// File parameters may carry their own limits in their extra options, using
/// the same field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    pub max_size: usize,
    pub max_fields: usize,
    pub max_file_size: usize,
    /// Allowed file content types (empty = all allowed)
    pub allowed_content_types: Vec<String>,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_fields: DEFAULT_MAX_FIELDS,
            max_file_size: DEFAULT_MAX_SIZE,
            allowed_content_types: Vec::new(),
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    pub fn max_fields(mut self, count: usize) -> Self {
        self.max_fields = count;
        self
    }

    pub fn max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn allow_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.allowed_content_types.push(content_type.into());
        self
    }
}

/// A parsed multipart body.
#[derive(Debug, Default)]
pub struct Multipart {
    /// Text fields; repeated names collect into arrays
    pub fields: Map<String, Value>,
    /// Files grouped by field name
    pub files: HashMap<String, Vec<UploadedFile>>,
}

#[derive(Debug, Clone, Default)]
pub struct MultipartParser {
    config: MultipartConfig,
}

impl MultipartParser {
    pub fn new(config: MultipartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MultipartConfig {
        &self.config
    }

    /// Parse `body` sent with the given `Content-Type`.
    pub fn parse(&self, content_type: Option<&str>, body: &Bytes) -> Result<Multipart, HttpError> {
        let content_type = content_type.ok_or_else(|| HttpError::bad_request("Missing Content-Type header"))?;
        if !content_type.starts_with("multipart/form-data") {
            return Err(HttpError::bad_request(format!(
                "Expected multipart/form-data, got: {}",
                content_type
            )));
        }
        let boundary = extract_boundary(content_type)
            .ok_or_else(|| HttpError::bad_request("Missing boundary in Content-Type"))?;

        if body.len() > self.config.max_size {
            return Err(HttpError::payload_too_large(format!(
                "Multipart body exceeds {} bytes",
                self.config.max_size
            )));
        }

        let parts = split_parts(body, &boundary);
        if parts.len() > self.config.max_fields {
            return Err(HttpError::payload_too_large(format!(
                "Multipart body has more than {} fields",
                self.config.max_fields
            )));
        }

        let mut multipart = Multipart::default();
        for part in parts {
            let Some(name) = part.name else {
                continue;
            };
            match part.file_name {
                Some(file_name) => {
                    let file = self.check_file(name.clone(), file_name, part.content_type, part.data)?;
                    multipart.files.entry(name).or_default().push(file);
                }
                None => {
                    let text = Value::String(String::from_utf8_lossy(&part.data).into_owned());
                    match multipart.fields.get_mut(&name) {
                        Some(Value::Array(items)) => items.push(text),
                        Some(existing) => {
                            let first = existing.take();
                            *existing = Value::Array(vec![first, text]);
                        }
                        None => {
                            multipart.fields.insert(name, text);
                        }
                    }
                }
            }
        }
        Ok(multipart)
    }

    fn check_file(
        &self,
        field_name: String,
        file_name: String,
        content_type: Option<String>,
        data: Bytes,
    ) -> Result<UploadedFile, HttpError> {
        if data.len() > self.config.max_file_size {
            return Err(HttpError::payload_too_large(format!(
                "File '{}' exceeds {} bytes",
                file_name, self.config.max_file_size
            )));
        }
        if !self.config.allowed_content_types.is_empty() {
            let allowed = content_type.as_deref().map_or(false, |ct| {
                self.config.allowed_content_types.iter().any(|allowed| allowed == ct)
            });
            if !allowed {
                return Err(HttpError::new(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "unsupported_media_type",
                    format!("File '{}' has a content type that is not allowed", file_name),
                ));
            }
        }
        Ok(UploadedFile {
            field_name,
            file_name: sanitize_filename(&file_name),
            content_type,
            size: data.len(),
            data,
        })
    }
}

struct Part {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        part.trim()
            .strip_prefix("boundary=")
            .map(|boundary| boundary.trim_matches('"').to_string())
    })
}

fn split_parts(body: &Bytes, boundary: &str) -> Vec<Part> {
    let delimiter = format!("--{}", boundary);
    let positions = find_all(body, delimiter.as_bytes());

    positions
        .windows(2)
        .filter_map(|window| {
            let mut start = window[0] + delimiter.len();
            let mut end = window[1];
            if body[start..end].starts_with(b"\r\n") {
                start += 2;
            }
            if body[start..end].ends_with(b"\r\n") {
                end -= 2;
            }

            let split = find(&body[start..end], b"\r\n\r\n")?;
            let headers = String::from_utf8_lossy(&body[start..start + split]);

            let mut part = Part {
                name: None,
                file_name: None,
                content_type: None,
                data: body.slice(start + split + 4..end),
            };
            for line in headers.lines() {
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                let value = value.trim();
                match key.trim().to_ascii_lowercase().as_str() {
                    "content-disposition" => {
                        for attribute in value.split(';').map(str::trim) {
                            if let Some(name) = attribute.strip_prefix("name=") {
                                part.name = Some(name.trim_matches('"').to_string());
                            } else if let Some(file_name) = attribute.strip_prefix("filename=") {
                                part.file_name = Some(file_name.trim_matches('"').to_string());
                            }
                        }
                    }
                    "content-type" => part.content_type = Some(value.to_string()),
                    _ => {}
                }
            }
            Some(part)
        })
        .collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut offset = 0;
    while let Some(position) = find(&haystack[offset..], needle) {
        positions.push(offset + position);
        offset += position + needle.len();
    }
    positions
}

/// Strip path separators and parent references from a client file name.
fn sanitize_filename(filename: &str) -> String {
    filename
        .replace(['/', '\\'], "_")
        .replace("..", "_")
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT_TYPE: &str = "multipart/form-data; boundary=----RoutekitBoundary";

    fn body() -> Bytes {
        Bytes::from(
            "------RoutekitBoundary\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\
             \r\n\
             holiday\r\n\
             ------RoutekitBoundary\r\n\
             Content-Disposition: form-data; name=\"photo\"; filename=\"beach.png\"\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             \x01\x02binary\r\n\
             ------RoutekitBoundary\r\n\
             Content-Disposition: form-data; name=\"photo\"; filename=\"../sun.png\"\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             sun\r\n\
             ------RoutekitBoundary--\r\n",
        )
    }

    #[test]
    fn extracts_boundary() {
        assert_eq!(extract_boundary(CONTENT_TYPE).as_deref(), Some("----RoutekitBoundary"));
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=\"quoted\"").as_deref(),
            Some("quoted")
        );
        assert_eq!(extract_boundary("multipart/form-data"), None);
    }

    #[test]
    fn parses_fields_and_files() {
        let multipart = MultipartParser::default().parse(Some(CONTENT_TYPE), &body()).unwrap();
        assert_eq!(multipart.fields.get("title"), Some(&Value::String("holiday".into())));

        let photos = &multipart.files["photo"];
        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0].file_name, "beach.png");
        assert_eq!(photos[0].content_type.as_deref(), Some("image/png"));
        assert_eq!(&photos[0].data[..], b"\x01\x02binary");
        assert_eq!(photos[0].size, 8);
        assert_eq!(photos[1].file_name, "__sun.png");
    }

    #[test]
    fn enforces_limits() {
        let parser = MultipartParser::new(MultipartConfig::new().max_file_size(4));
        let err = parser.parse(Some(CONTENT_TYPE), &body()).unwrap_err();
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);

        let parser = MultipartParser::new(MultipartConfig::new().max_fields(2));
        assert!(parser.parse(Some(CONTENT_TYPE), &body()).is_err());

        let parser = MultipartParser::new(MultipartConfig::new().allow_content_type("image/jpeg"));
        let err = parser.parse(Some(CONTENT_TYPE), &body()).unwrap_err();
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn rejects_other_content_types() {
        let parser = MultipartParser::default();
        assert!(parser.parse(Some("application/json"), &body()).is_err());
        assert!(parser.parse(None, &body()).is_err());
    }

    #[test]
    fn config_reads_partial_options() {
        let config: MultipartConfig = serde_json::from_value(serde_json::json!({"max_file_size": 1024})).unwrap();
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(config.max_fields, DEFAULT_MAX_FIELDS);
    }

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "____etc_passwd");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
    }
}
