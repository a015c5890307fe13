//! Target types and plain/object conversion.
//!
//! A parameter may declare the type its value should be coerced into. Scalar
//! targets are coerced by the parameter handler; object targets go through an
//! [`ObjectType`], which converts the plain JSON value into the declared model
//! (applying serde defaults, renames and field filtering), converts results
//! back to plain values and validates them.

use routekit_validate::ValidationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Options for plain/object conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassTransformOptions {
    /// Object keys starting with any of these prefixes are dropped
    pub exclude_prefixes: Vec<String>,
}

impl ClassTransformOptions {
    pub fn exclude_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.exclude_prefixes.push(prefix.into());
        self
    }

    /// Apply the options to a plain value, recursively.
    pub fn apply(&self, value: Value) -> Value {
        if self.exclude_prefixes.is_empty() {
            return value;
        }
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| !self.exclude_prefixes.iter().any(|p| key.starts_with(p.as_str())))
                    .map(|(key, value)| (key, self.apply(value)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.apply(v)).collect()),
            other => other,
        }
    }
}

/// Conversion between plain JSON values and a declared model type.
pub trait ObjectType: Send + Sync {
    /// Name used in error messages
    fn name(&self) -> &str;

    /// Convert a plain value into the model's canonical shape.
    fn from_plain(&self, value: Value, options: &ClassTransformOptions) -> Result<Value, String>;

    /// Convert a model value back into a plain value.
    fn to_plain(&self, value: Value, options: &ClassTransformOptions) -> Result<Value, String>;

    /// Validate a converted value.
    fn validate(&self, value: &Value) -> Result<(), ValidationError>;
}

/// Declared type of a parameter value.
#[derive(Clone)]
pub enum TargetType {
    String,
    /// Any JSON number (parsed as `f64` from text)
    Number,
    /// Whole numbers (parsed as `i64` from text)
    Integer,
    Boolean,
    Object(Arc<dyn ObjectType>),
    /// No declared type: the value passes through unchanged
    Any,
}

impl TargetType {
    /// Object target backed by the serde type `T`.
    pub fn model<T>() -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        TargetType::Object(Arc::new(Model::<T>::new()))
    }

    /// Object target backed by `T`, validated with its `validator` rules.
    pub fn validated<T>() -> Self
    where
        T: Serialize + DeserializeOwned + routekit_validate::Validate + Send + Sync + 'static,
    {
        TargetType::Object(Arc::new(Model::<T>::validated()))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, TargetType::Object(_))
    }

    pub fn name(&self) -> &str {
        match self {
            TargetType::String => "string",
            TargetType::Number => "number",
            TargetType::Integer => "integer",
            TargetType::Boolean => "boolean",
            TargetType::Object(object) => object.name(),
            TargetType::Any => "any",
        }
    }
}

impl Default for TargetType {
    fn default() -> Self {
        TargetType::Any
    }
}

impl fmt::Debug for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Object(object) => write!(f, "Object({})", object.name()),
            other => f.write_str(other.name()),
        }
    }
}

/// [`ObjectType`] for any serde model.
pub struct Model<T> {
    name: &'static str,
    validator: Option<fn(&T) -> Result<(), ValidationError>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Model<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub fn new() -> Self {
        let full = std::any::type_name::<T>();
        Self {
            name: full.rsplit("::").next().unwrap_or(full),
            validator: None,
            _marker: PhantomData,
        }
    }

    fn convert(&self, value: Value) -> Result<Value, String> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.convert(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            value => {
                let model: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
                serde_json::to_value(model).map_err(|e| e.to_string())
            }
        }
    }
}

impl<T> Model<T>
where
    T: Serialize + DeserializeOwned + routekit_validate::Validate + 'static,
{
    /// A model whose values are validated after conversion.
    pub fn validated() -> Self {
        Self {
            validator: Some(validate_model::<T>),
            ..Self::new()
        }
    }
}

impl<T> Default for Model<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn validate_model<T: routekit_validate::Validate>(model: &T) -> Result<(), ValidationError> {
    routekit_validate::Validate::validate(model)
}

impl<T> ObjectType for Model<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn from_plain(&self, value: Value, options: &ClassTransformOptions) -> Result<Value, String> {
        self.convert(options.apply(value))
    }

    fn to_plain(&self, value: Value, options: &ClassTransformOptions) -> Result<Value, String> {
        self.convert(value).map(|plain| options.apply(plain))
    }

    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let Some(validator) = self.validator else {
            return Ok(());
        };
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        let mut errors = ValidationError::new(Vec::new());
        for (index, item) in items.iter().enumerate() {
            let model: T = serde_json::from_value((*item).clone()).map_err(|e| {
                ValidationError::field("", "type", format!("Value is not a valid {}: {}", self.name, e))
            })?;
            if let Err(failed) = validator(&model) {
                for mut field in failed.fields {
                    if matches!(value, Value::Array(_)) {
                        field.field = format!("[{}].{}", index, field.field);
                    }
                    errors.add(field);
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use validator::Validate;

    #[derive(Debug, Serialize, Deserialize, Validate)]
    struct User {
        #[validate(length(min = 3))]
        name: String,
        #[serde(default)]
        admin: bool,
    }

    #[test]
    fn from_plain_applies_serde_defaults() {
        let model = Model::<User>::new();
        let value = model
            .from_plain(json!({"name": "alice"}), &ClassTransformOptions::default())
            .unwrap();
        assert_eq!(value, json!({"name": "alice", "admin": false}));
    }

    #[test]
    fn from_plain_rejects_wrong_shape() {
        let model = Model::<User>::new();
        assert!(model
            .from_plain(json!({"admin": true}), &ClassTransformOptions::default())
            .is_err());
    }

    #[test]
    fn exclude_prefixes_apply_recursively() {
        let options = ClassTransformOptions::default().exclude_prefix("_");
        let plain = options.apply(json!({"a": 1, "_b": 2, "c": [{"_d": 3, "e": 4}]}));
        assert_eq!(plain, json!({"a": 1, "c": [{"e": 4}]}));
    }

    #[test]
    fn validated_model_reports_fields() {
        let model = Model::<User>::validated();
        assert!(model.validate(&json!({"name": "alice"})).is_ok());

        let error = model.validate(&json!({"name": "al"})).unwrap_err();
        assert_eq!(error.fields[0].field, "name");

        let error = model
            .validate(&json!([{"name": "alice"}, {"name": "x"}]))
            .unwrap_err();
        assert_eq!(error.fields[0].field, "[1].name");
    }

    #[test]
    fn unvalidated_model_accepts_anything() {
        let model = Model::<User>::new();
        assert!(model.validate(&json!({"name": "x"})).is_ok());
    }
}
