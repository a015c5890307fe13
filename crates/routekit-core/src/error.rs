//! Error types for RouteKit
//!
//! Two layers:
//!
//! - [`HttpError`] is the wire-level error: status, type identifier, message,
//!   optional field errors and internal details that are only shown in
//!   development mode. Handlers, interceptors and middlewares return it.
//! - [`RoutingError`] is the taxonomy of everything that can go wrong while a
//!   request travels through the pipeline. Every variant funnels into a single
//!   adapter error emission, which converts it with [`RoutingError::into_http_error`].

use http::StatusCode;
use routekit_validate::{FieldError, ValidationError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type alias for RouteKit operations
pub type Result<T, E = RoutingError> = std::result::Result<T, E>;

/// Standard HTTP error type
///
/// Provides structured error responses following a consistent JSON format.
#[derive(Debug, Clone)]
pub struct HttpError {
    /// HTTP status code
    pub status: StatusCode,
    /// Error type identifier
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Optional field-level validation errors
    pub fields: Option<Vec<FieldError>>,
    /// Internal details (hidden outside development mode)
    pub(crate) internal: Option<String>,
}

impl HttpError {
    /// Create a new HTTP error
    pub fn new(status: StatusCode, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            message: message.into(),
            fields: None,
            internal: None,
        }
    }

    /// Create a validation error with field details
    pub fn validation(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error_type: "validation_error".to_string(),
            message: message.into(),
            fields: Some(fields),
            internal: None,
        }
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// Create a 401 Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    /// Create a 403 Forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    /// Create a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Create a 409 Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// Create a 413 Payload Too Large error
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message)
    }

    /// Create a 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// Add internal details (for logging, hidden from response in production)
    pub fn with_internal(mut self, details: impl Into<String>) -> Self {
        self.internal = Some(details.into());
        self
    }

    /// Internal details, if any
    pub fn internal_details(&self) -> Option<&str> {
        self.internal.as_deref()
    }

    /// Serialize the error envelope.
    ///
    /// Internal details are only included when `development` is set.
    pub fn to_json(&self, development: bool) -> serde_json::Value {
        let envelope = ErrorResponse {
            error: ErrorBody {
                error_type: &self.error_type,
                message: &self.message,
                fields: self.fields.as_deref(),
                details: if development { self.internal.as_deref() } else { None },
            },
        };
        serde_json::to_value(envelope).unwrap_or_else(|_| {
            serde_json::json!({"error": {"type": "internal_error", "message": "Failed to serialize error"}})
        })
    }

    /// Plain-text representation of the error.
    pub fn to_text(&self, development: bool) -> String {
        match (&self.internal, development) {
            (Some(details), true) => format!("{}\n{}", self.message, details),
            _ => self.message.clone(),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for HttpError {}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    error_type: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldError]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

// Conversion from common error types
impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::bad_request(format!("Invalid JSON: {}", err))
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        HttpError::internal("I/O error").with_internal(err.to_string())
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::internal("HTTP error").with_internal(err.to_string())
    }
}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        HttpError::validation(err.message, err.fields)
    }
}

/// Every failure the routing pipeline can produce.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Misconfiguration detected while serving a request (never retried)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required named parameter resolved to nothing
    #[error("parameter '{param}' is required for request on {action}")]
    ParamRequired { param: String, action: String },

    /// A required body was absent or empty
    #[error("request body is required for request on {action}")]
    BodyRequired { action: String },

    /// A `parse` parameter carried text that is not JSON
    #[error("parameter '{param}' is invalid: value {value} can not be parsed as JSON")]
    InvalidJson { param: String, value: String },

    /// A value could not be coerced into the declared target type
    #[error("parameter '{param}' is invalid: value {value} can not be parsed into {expected}")]
    InvalidParam {
        param: String,
        value: String,
        expected: &'static str,
    },

    /// A request value does not have the shape of the declared object type
    #[error("parameter '{param}' is invalid: value can not be converted into {target}: {message}")]
    InvalidObject {
        param: String,
        target: String,
        message: String,
    },

    /// A result could not be converted into its plain form
    #[error("parameter '{param}' can not be converted into {target}: {message}")]
    Transform {
        param: String,
        target: String,
        message: String,
    },

    /// The adapter failed to read a value from the request
    #[error("failed to read parameter '{param}': {message}")]
    Extraction { param: String, message: String },

    /// The converted value violated its declared constraints
    #[error(transparent)]
    Validation(ValidationError),

    /// The authorization checker refused a request that required no roles
    #[error("Authorization is required for request on {method} {path}")]
    AuthorizationRequired { method: String, path: String },

    /// The authorization checker refused a request that required roles
    #[error("Access is denied for request on {method} {path}")]
    AccessDenied { method: String, path: String },

    /// The action method failed
    #[error("{0}")]
    Handler(HttpError),

    /// An interceptor failed; the partially transformed result is discarded
    #[error("{0}")]
    Interceptor(HttpError),

    /// A middleware failed
    #[error("{0}")]
    Middleware(HttpError),

    /// The action produced no result and no status was declared for that case
    #[error("Not Found")]
    NotFound,
}

impl RoutingError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// HTTP status this error is emitted with
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Configuration(_) | Self::Transform { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ParamRequired { .. }
            | Self::BodyRequired { .. }
            | Self::InvalidJson { .. }
            | Self::InvalidParam { .. }
            | Self::InvalidObject { .. }
            | Self::Extraction { .. }
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AuthorizationRequired { .. } => StatusCode::UNAUTHORIZED,
            Self::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Self::Handler(e) | Self::Interceptor(e) | Self::Middleware(e) => e.status,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Whether the error was caused by client input (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Convert into the wire-level error.
    pub fn into_http_error(self) -> HttpError {
        let status = self.status();
        match self {
            Self::Handler(e) | Self::Interceptor(e) | Self::Middleware(e) => e,
            Self::Validation(e) => {
                let message = match &e.target {
                    Some(target) => format!(
                        "Invalid value for parameter '{}', check 'fields' for more info",
                        target
                    ),
                    None => e.message.clone(),
                };
                HttpError::validation(message, e.fields)
            }
            Self::Configuration(message) => {
                HttpError::internal("Internal server error").with_internal(message)
            }
            Self::Transform { .. } => {
                let message = self.to_string();
                HttpError::internal("Internal server error").with_internal(message)
            }
            other => {
                let error_type = match &other {
                    Self::ParamRequired { .. } | Self::BodyRequired { .. } => "param_required",
                    Self::InvalidJson { .. } => "invalid_json",
                    Self::InvalidParam { .. } | Self::InvalidObject { .. } | Self::Extraction { .. } => {
                        "invalid_param"
                    }
                    Self::AuthorizationRequired { .. } => "authorization_required",
                    Self::AccessDenied { .. } => "access_denied",
                    _ => "not_found",
                };
                HttpError::new(status, error_type, other.to_string())
            }
        }
    }
}

impl From<HttpError> for RoutingError {
    fn from(err: HttpError) -> Self {
        RoutingError::Handler(err)
    }
}

impl From<ValidationError> for RoutingError {
    fn from(err: ValidationError) -> Self {
        RoutingError::Validation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_input_errors_are_bad_requests() {
        let err = RoutingError::ParamRequired {
            param: "id".into(),
            action: "GET /users/:id".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());

        let http = err.into_http_error();
        assert_eq!(http.error_type, "param_required");
        assert!(http.message.contains("'id'"));
    }

    #[test]
    fn authorization_variants_have_distinct_statuses() {
        let required = RoutingError::AuthorizationRequired {
            method: "GET".into(),
            path: "/admin".into(),
        };
        let denied = RoutingError::AccessDenied {
            method: "GET".into(),
            path: "/admin".into(),
        };
        assert_eq!(required.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            denied.to_string(),
            "Access is denied for request on GET /admin"
        );
    }

    #[test]
    fn handler_errors_keep_their_status() {
        let err = RoutingError::Handler(HttpError::conflict("taken"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.into_http_error().message, "taken");
    }

    #[test]
    fn configuration_details_only_in_development() {
        let http = RoutingError::configuration("no authorization checker").into_http_error();
        assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);

        let prod = http.to_json(false);
        assert!(prod["error"].get("details").is_none());

        let dev = http.to_json(true);
        assert_eq!(dev["error"]["details"], "no authorization checker");
        assert!(http.to_text(true).contains("no authorization checker"));
        assert!(!http.to_text(false).contains("no authorization checker"));
    }

    #[test]
    fn validation_error_carries_fields() {
        let err: RoutingError = ValidationError::field("email", "email", "bad email")
            .for_target("user")
            .into();
        let http = err.into_http_error();
        assert_eq!(http.error_type, "validation_error");
        assert_eq!(http.fields.as_ref().map(Vec::len), Some(1));
        assert!(http.message.contains("'user'"));
    }

    #[test]
    fn request_shape_errors_are_client_errors() {
        let request = RoutingError::InvalidObject {
            param: "body".into(),
            target: "NewUser".into(),
            message: "missing field `name`".into(),
        };
        assert_eq!(request.status(), StatusCode::BAD_REQUEST);
        let http = request.into_http_error();
        assert_eq!(http.error_type, "invalid_param");
        assert!(http.message.contains("missing field `name`"));

        let response = RoutingError::Transform {
            param: "result".into(),
            target: "User".into(),
            message: "invalid type".into(),
        };
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
