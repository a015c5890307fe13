use crate::context::RequestContext;
use crate::error::HttpError;
use crate::transform::{ClassTransformOptions, ObjectType};
use http::StatusCode;
use std::fmt;
use std::sync::Arc;

/// What to do when an action returns nothing (or null).
#[derive(Clone)]
pub enum OnEmpty {
    /// Respond with this status
    Status(StatusCode),
    /// Fail with the produced error
    Error(Arc<dyn Fn(&RequestContext) -> HttpError + Send + Sync>),
}

impl OnEmpty {
    pub fn error<F>(factory: F) -> Self
    where
        F: Fn(&RequestContext) -> HttpError + Send + Sync + 'static,
    {
        OnEmpty::Error(Arc::new(factory))
    }

    /// Status to respond with, or the error to raise instead.
    pub fn resolve(&self, ctx: &RequestContext) -> Result<StatusCode, HttpError> {
        match self {
            OnEmpty::Status(status) => Ok(*status),
            OnEmpty::Error(factory) => Err(factory(ctx)),
        }
    }
}

impl fmt::Debug for OnEmpty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnEmpty::Status(status) => write!(f, "Status({})", status.as_u16()),
            OnEmpty::Error(_) => f.write_str("Error(..)"),
        }
    }
}

/// Response-shaping declarations on a controller or action.
#[derive(Clone)]
pub enum ResponseHandlerKind {
    SuccessCode(StatusCode),
    OnUndefined(OnEmpty),
    OnNull(OnEmpty),
    /// Sets `Content-Type`; a value containing `json` makes the action JSON-typed
    ContentType(String),
    Header(String, String),
    Location(String),
    /// Redirect target; `:key` placeholders are filled from an object result
    Redirect(String),
    /// Template rendered with the result as context
    Render(String),
    Authorized(Vec<String>),
    /// Options for converting the result to a plain value
    ResponseClassTransform(ClassTransformOptions),
    /// Model the result is converted through before emission
    ResponseModel(Arc<dyn ObjectType>),
}

impl ResponseHandlerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ResponseHandlerKind::SuccessCode(_) => "success-code",
            ResponseHandlerKind::OnUndefined(_) => "on-undefined",
            ResponseHandlerKind::OnNull(_) => "on-null",
            ResponseHandlerKind::ContentType(_) => "content-type",
            ResponseHandlerKind::Header(_, _) => "header",
            ResponseHandlerKind::Location(_) => "location",
            ResponseHandlerKind::Redirect(_) => "redirect",
            ResponseHandlerKind::Render(_) => "rendered-template",
            ResponseHandlerKind::Authorized(_) => "authorized",
            ResponseHandlerKind::ResponseClassTransform(_) => "response-class-transform",
            ResponseHandlerKind::ResponseModel(_) => "response-model",
        }
    }
}

impl fmt::Debug for ResponseHandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
