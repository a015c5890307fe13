//! Action parameter handler.
//!
//! Turns one [`ParamMetadata`] into the concrete argument for one request:
//! extraction through the adapter, the required check, array casting, JSON
//! parsing, scalar coercion, object conversion and validation. Parameters
//! with a custom transform skip everything after extraction except the
//! required check, which is applied to the transform's result.

use crate::adapter::Adapter;
use crate::context::RequestContext;
use crate::error::{Result, RoutingError};
use crate::metadata::{ActionMetadata, ParamKind, ParamMetadata};
use crate::transform::{ObjectType, TargetType};
use serde_json::{Number, Value};

/// Resolves parameter values through an adapter.
pub struct ActionParameterHandler<'a, A> {
    driver: &'a A,
}

impl<'a, A: Adapter> ActionParameterHandler<'a, A> {
    pub fn new(driver: &'a A) -> Self {
        Self { driver }
    }

    /// Resolve the value of `param` for the request in `ctx`.
    ///
    /// `Ok(None)` means the parameter is optional and absent.
    pub async fn handle(
        &self,
        ctx: &RequestContext,
        action: &ActionMetadata,
        param: &ParamMetadata,
    ) -> Result<Option<Value>> {
        if param.kind == ParamKind::CurrentUser {
            return self.current_user(ctx, param).await;
        }

        let value = self.driver.get_param_from_request(ctx, param).await?;

        if let Some(transform) = &param.transform {
            let value = transform(ctx, value).await.map_err(RoutingError::Handler)?;
            check_required(&value, action, param)?;
            return Ok(value);
        }

        check_required(&value, action, param)?;
        let Some(mut value) = value else {
            return Ok(None);
        };

        if param.is_array && !value.is_array() {
            value = Value::Array(vec![value]);
        }

        if param.parse || param.target_type.is_object() {
            value = map_elements(value, &|item| parse_json(item, param))?;
        }

        match &param.target_type {
            TargetType::Object(object) => self.transform_object(value, action, param, object.as_ref()),
            TargetType::Any => Ok(Some(value)),
            target => map_elements(value, &|item| coerce(item, target, param)).map(Some),
        }
    }

    async fn current_user(&self, ctx: &RequestContext, param: &ParamMetadata) -> Result<Option<Value>> {
        let checker = self
            .driver
            .settings()
            .current_user_checker
            .as_ref()
            .ok_or_else(|| {
                RoutingError::configuration(
                    "A current-user parameter is used but no current user checker is configured",
                )
            })?;

        let user = checker.current_user(ctx).await.map_err(RoutingError::Handler)?;
        if param.required && user.as_ref().map_or(true, Value::is_null) {
            return Err(RoutingError::AuthorizationRequired {
                method: ctx.method().to_string(),
                path: ctx.path().to_string(),
            });
        }
        Ok(user)
    }

    fn transform_object(
        &self,
        value: Value,
        action: &ActionMetadata,
        param: &ParamMetadata,
        object: &dyn ObjectType,
    ) -> Result<Option<Value>> {
        if !matches!(value, Value::Object(_) | Value::Array(_)) {
            return Ok(Some(value));
        }

        let settings = self.driver.settings();
        let transform = action
            .options
            .transform_request
            .unwrap_or(settings.class_transformer);

        let value = if transform {
            let options = param
                .class_transform
                .as_ref()
                .unwrap_or(&settings.plain_to_class_options);
            object
                .from_plain(value, options)
                .map_err(|message| RoutingError::InvalidObject {
                    param: param.display_name().to_string(),
                    target: object.name().to_string(),
                    message,
                })?
        } else {
            value
        };

        if param.validate.unwrap_or(settings.validation) {
            object
                .validate(&value)
                .map_err(|e| RoutingError::Validation(e.for_target(param.display_name())))?;
        }

        Ok(Some(value))
    }
}

fn check_required(value: &Option<Value>, action: &ActionMetadata, param: &ParamMetadata) -> Result<()> {
    if !param.required {
        return Ok(());
    }

    let body = param.kind == ParamKind::Body;
    let empty = match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Object(map)) => body && map.is_empty(),
        Some(_) => false,
    };
    if !empty {
        return Ok(());
    }

    if body {
        Err(RoutingError::BodyRequired {
            action: action.display_name(),
        })
    } else {
        Err(RoutingError::ParamRequired {
            param: param.display_name().to_string(),
            action: action.display_name(),
        })
    }
}

/// Apply `f` to every element of an array, or to the value itself.
fn map_elements(value: Value, f: &dyn Fn(Value) -> Result<Value>) -> Result<Value> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(f)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => f(other),
    }
}

fn parse_json(value: Value, param: &ParamMetadata) -> Result<Value> {
    match value {
        Value::String(text) => serde_json::from_str(&text).map_err(|_| RoutingError::InvalidJson {
            param: param.display_name().to_string(),
            value: text,
        }),
        other => Ok(other),
    }
}

fn coerce(value: Value, target: &TargetType, param: &ParamMetadata) -> Result<Value> {
    let invalid = |value: &Value, expected: &'static str| RoutingError::InvalidParam {
        param: param.display_name().to_string(),
        value: value.to_string(),
        expected,
    };

    match (target, value) {
        (_, Value::Null) => Ok(Value::Null),

        (TargetType::String, Value::String(s)) => Ok(Value::String(s)),
        (TargetType::String, value @ (Value::Number(_) | Value::Bool(_))) => Ok(Value::String(value.to_string())),
        (TargetType::String, value) => Err(invalid(&value, "string")),

        (TargetType::Number, Value::Number(n)) => Ok(Value::Number(n)),
        (TargetType::Number, Value::String(s)) => parse_number(&s).ok_or_else(|| invalid(&Value::String(s), "number")),
        (TargetType::Number, value) => Err(invalid(&value, "number")),

        (TargetType::Integer, Value::Number(n)) => integer(&n)
            .map(Value::from)
            .ok_or_else(|| invalid(&Value::Number(n), "integer")),
        (TargetType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid(&Value::String(s), "integer")),
        (TargetType::Integer, value) => Err(invalid(&value, "integer")),

        (TargetType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (TargetType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid(&Value::String(s), "boolean")),
        },
        (TargetType::Boolean, value) => Err(invalid(&value, "boolean")),

        (TargetType::Object(_) | TargetType::Any, value) => Ok(value),
    }
}

/// Parse text as a JSON number; whole numbers stay integers.
fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::from(int));
    }
    let float = text.parse::<f64>().ok()?;
    Number::from_f64(float).map(Value::Number)
}

fn integer(n: &Number) -> Option<i64> {
    if let Some(int) = n.as_i64() {
        return Some(int);
    }
    let float = n.as_f64()?;
    if float.fract() == 0.0 && float >= i64::MIN as f64 && float <= i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}
