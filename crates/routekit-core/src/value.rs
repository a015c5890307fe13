//! Values flowing through an action call.
//!
//! Parameters are resolved into `Option<serde_json::Value>` (`None` is an
//! absent value, `Some(Value::Null)` an explicit null). Action methods receive
//! them positionally as [`Args`] and return an [`Output`].

use crate::error::HttpError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Result of an action method, after every interceptor has seen it.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// The method produced nothing
    Undefined,
    /// A structured or scalar value; `Value::Null` is an explicit null
    Value(Value),
    /// Raw bytes, written as-is
    Binary(Bytes),
}

impl Output {
    /// Serialize any value into an output.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HttpError> {
        serde_json::to_value(value)
            .map(Output::Value)
            .map_err(|e| HttpError::internal("Failed to serialize result").with_internal(e.to_string()))
    }

    /// An explicit null result.
    pub fn null() -> Self {
        Output::Value(Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Output::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Output::Value(Value::Null))
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Value(value)
    }
}

impl From<()> for Output {
    fn from(_: ()) -> Self {
        Output::Undefined
    }
}

impl From<Bytes> for Output {
    fn from(bytes: Bytes) -> Self {
        Output::Binary(bytes)
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Output::Value(Value::String(text))
    }
}

impl From<&'static str> for Output {
    fn from(text: &'static str) -> Self {
        Output::Value(Value::String(text.to_string()))
    }
}

impl<T: Into<Output>> From<Option<T>> for Output {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Output::Value(Value::Null),
        }
    }
}

/// Positional arguments of one action call, ordered by parameter index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<Option<Value>>,
}

impl Args {
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`; `None` when absent or out of range.
    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Deserialize the argument at `index`.
    ///
    /// An absent argument deserializes from `null`, so `Option<T>` targets
    /// receive `None`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, HttpError> {
        let value = self.raw(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            HttpError::internal(format!("Argument {} has an unexpected shape", index))
                .with_internal(e.to_string())
        })
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<Value>> {
        self.values
    }
}
