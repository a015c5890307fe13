use crate::class::ClassRef;
use crate::handler::ParamTransform;
use crate::transform::{ClassTransformOptions, TargetType};
use serde_json::Value;
use std::fmt;

/// Where a parameter value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Body,
    BodyParam,
    Param,
    Params,
    Query,
    Queries,
    Header,
    Headers,
    Cookie,
    Cookies,
    Session,
    SessionParam,
    File,
    Files,
    State,
    CurrentUser,
    /// Value produced by a custom transform
    Custom,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Body => "body",
            ParamKind::BodyParam => "body-param",
            ParamKind::Param => "param",
            ParamKind::Params => "params",
            ParamKind::Query => "query",
            ParamKind::Queries => "queries",
            ParamKind::Header => "header",
            ParamKind::Headers => "headers",
            ParamKind::Cookie => "cookie",
            ParamKind::Cookies => "cookies",
            ParamKind::Session => "session",
            ParamKind::SessionParam => "session-param",
            ParamKind::File => "file",
            ParamKind::Files => "files",
            ParamKind::State => "state",
            ParamKind::CurrentUser => "current-user",
            ParamKind::Custom => "custom-converter",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parameter of an action.
#[derive(Clone)]
pub struct ParamMetadata {
    pub target: ClassRef,
    pub method: String,
    /// Position in the action call
    pub index: usize,
    pub kind: ParamKind,
    pub name: Option<String>,
    pub required: bool,
    /// Parse textual values as JSON
    pub parse: bool,
    /// Wrap scalar values into a single-element array
    pub is_array: bool,
    pub target_type: TargetType,
    pub transform: Option<ParamTransform>,
    /// Overrides the driver's validation default
    pub validate: Option<bool>,
    /// Overrides the driver's plain-to-object options
    pub class_transform: Option<ClassTransformOptions>,
    /// Adapter-specific options (body limits, upload limits)
    pub extra_options: Option<Value>,
}

impl ParamMetadata {
    /// Name used in error messages: the declared name, else the kind.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }
}

impl fmt::Debug for ParamMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamMetadata")
            .field("method", &self.method)
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("required", &self.required)
            .field("parse", &self.parse)
            .field("is_array", &self.is_array)
            .field("target_type", &self.target_type)
            .field("custom_transform", &self.transform.is_some())
            .finish()
    }
}
