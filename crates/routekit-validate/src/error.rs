//! Validation error types and JSON error format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single field validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// The field name that failed validation (nested: "address.city", "tags[1]")
    pub field: String,
    /// The validation rule code (e.g., "email", "length", "range")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional parameters (e.g., min/max values)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<HashMap<String, serde_json::Value>>,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
            params: None,
        }
    }

    /// Create a field error with parameters.
    pub fn with_params(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        params: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
            params: Some(params),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    target: Option<String>,
    fields: Vec<FieldError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

/// Validation error containing all field errors of one validated value.
///
/// Serializes to the standard error envelope:
///
/// ```json
/// {
///   "error": {
///     "type": "validation_error",
///     "message": "Validation failed",
///     "target": "body",
///     "fields": [...]
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Collection of field-level validation errors
    pub fields: Vec<FieldError>,
    /// Custom error message (default: "Validation failed")
    pub message: String,
    /// Name of the parameter the validated value was bound to, if known
    pub target: Option<String>,
}

impl ValidationError {
    /// Create a new validation error with field errors.
    pub fn new(fields: Vec<FieldError>) -> Self {
        Self {
            fields,
            message: "Validation failed".to_string(),
            target: None,
        }
    }

    /// Create a validation error with a custom message.
    pub fn with_message(fields: Vec<FieldError>, message: impl Into<String>) -> Self {
        Self {
            fields,
            message: message.into(),
            target: None,
        }
    }

    /// Create a validation error for a single field.
    pub fn field(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(vec![FieldError::new(field, code, message)])
    }

    /// Attach the name of the parameter this error belongs to.
    pub fn for_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get the number of field errors.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Add a field error.
    pub fn add(&mut self, error: FieldError) {
        self.fields.push(error);
    }

    /// Convert validator errors to our format.
    ///
    /// Nested struct and list errors are flattened into dotted / indexed
    /// field paths. Fields are sorted so the output is stable.
    pub fn from_validator_errors(errors: validator::ValidationErrors) -> Self {
        let mut field_errors = Vec::new();
        collect_errors(&errors, "", &mut field_errors);
        field_errors.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));
        Self::new(field_errors)
    }
}

fn collect_errors(errors: &validator::ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    out.push(convert_field_error(&path, error));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_errors(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

fn convert_field_error(path: &str, error: &validator::ValidationError) -> FieldError {
    let message = error
        .message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("Validation failed for field '{}'", path));

    let params = if error.params.is_empty() {
        None
    } else {
        let mut map = HashMap::new();
        for (key, value) in &error.params {
            if let Ok(json_value) = serde_json::to_value(value) {
                map.insert(key.to_string(), json_value);
            }
        }
        Some(map)
    };

    FieldError {
        field: path.to_string(),
        code: error.code.to_string(),
        message,
        params,
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(
                f,
                "{} for '{}': {} field error(s)",
                self.message,
                target,
                self.fields.len()
            ),
            None => write!(f, "{}: {} field error(s)", self.message, self.fields.len()),
        }
    }
}

impl std::error::Error for ValidationError {}

impl Serialize for ValidationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let wrapper = ErrorWrapper {
            error: ErrorBody {
                error_type: "validation_error".to_string(),
                message: self.message.clone(),
                target: self.target.clone(),
                fields: self.fields.clone(),
            },
        };
        wrapper.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValidationError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wrapper = ErrorWrapper::deserialize(deserializer)?;
        Ok(Self {
            fields: wrapper.error.fields,
            message: wrapper.error.message,
            target: wrapper.error.target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_error_creation() {
        let error = FieldError::new("email", "email", "Invalid email format");
        assert_eq!(error.field, "email");
        assert_eq!(error.code, "email");
        assert_eq!(error.message, "Invalid email format");
        assert!(error.params.is_none());
    }

    #[test]
    fn validation_error_serialization() {
        let error = ValidationError::new(vec![FieldError::new(
            "email",
            "email",
            "Invalid email format",
        )])
        .for_target("body");

        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(json["error"]["type"], "validation_error");
        assert_eq!(json["error"]["message"], "Validation failed");
        assert_eq!(json["error"]["target"], "body");
        assert_eq!(json["error"]["fields"][0]["field"], "email");
    }

    #[test]
    fn validation_error_display() {
        let error = ValidationError::new(vec![
            FieldError::new("email", "email", "Invalid email"),
            FieldError::new("age", "range", "Out of range"),
        ]);
        assert_eq!(error.to_string(), "Validation failed: 2 field error(s)");

        let error = error.for_target("user");
        assert_eq!(error.to_string(), "Validation failed for 'user': 2 field error(s)");
    }

    #[test]
    fn deserializes_back_from_envelope() {
        let json = r#"{"error":{"type":"validation_error","message":"Nope","fields":[{"field":"a","code":"length","message":"too short"}]}}"#;
        let error: ValidationError = serde_json::from_str(json).unwrap();
        assert_eq!(error.message, "Nope");
        assert_eq!(error.target, None);
        assert_eq!(error.fields[0].code, "length");
    }
}
