//! Handler function types.
//!
//! Action methods are stored type-erased: a [`MethodHandler`] takes the
//! controller instance resolved by the container and the positional
//! [`Args`], and returns a boxed future of the [`Output`]. [`method`] builds
//! one from a typed async closure.

use crate::class::Instance;
use crate::context::RequestContext;
use crate::error::HttpError;
use crate::metadata::ActionMetadata;
use crate::value::{Args, Output};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Type-erased action method.
pub type MethodHandler =
    Arc<dyn Fn(Instance, Args) -> BoxFuture<'static, Result<Output, HttpError>> + Send + Sync>;

/// Replaces the call to the action method entirely.
pub type MethodOverride = Arc<
    dyn Fn(&ActionMetadata, &RequestContext, Args) -> BoxFuture<'static, Result<Output, HttpError>>
        + Send
        + Sync,
>;

/// Produces extra arguments placed before the resolved parameters.
pub type AppendParams = Arc<dyn Fn(&RequestContext) -> Vec<Option<Value>> + Send + Sync>;

/// Custom parameter conversion. Receives the extracted raw value; its result
/// is the final parameter value.
pub type ParamTransform = Arc<
    dyn Fn(&RequestContext, Option<Value>) -> BoxFuture<'static, Result<Option<Value>, HttpError>>
        + Send
        + Sync,
>;

/// Erase a typed controller method.
///
/// ```rust,ignore
/// let handler = method(|users: Arc<UserController>, args: Args| async move {
///     let id: i64 = args.get(0)?;
///     users.find(id).await
/// });
/// ```
pub fn method<C, F, Fut, O>(f: F) -> MethodHandler
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, HttpError>> + Send + 'static,
    O: Into<Output>,
{
    Arc::new(move |instance: Instance, args: Args| -> BoxFuture<'static, Result<Output, HttpError>> {
        match instance.downcast::<C>() {
            Ok(controller) => {
                let fut = f(controller, args);
                Box::pin(async move { fut.await.map(Into::<Output>::into) })
            }
            Err(_) => Box::pin(async move {
                Err::<Output, HttpError>(
                    HttpError::internal("Controller instance has an unexpected type")
                        .with_internal(std::any::type_name::<C>()),
                )
            }),
        }
    })
}

/// Build a [`MethodOverride`] from a closure.
pub fn method_override<F, Fut, O>(f: F) -> MethodOverride
where
    F: Fn(&ActionMetadata, &RequestContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, HttpError>> + Send + 'static,
    O: Into<Output>,
{
    Arc::new(
        move |action: &ActionMetadata,
              ctx: &RequestContext,
              args: Args|
              -> BoxFuture<'static, Result<Output, HttpError>> {
            let fut = f(action, ctx, args);
            Box::pin(async move { fut.await.map(Into::<Output>::into) })
        },
    )
}

/// Build an [`AppendParams`] hook from a closure.
pub fn append_params<F>(f: F) -> AppendParams
where
    F: Fn(&RequestContext) -> Vec<Option<Value>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a [`ParamTransform`] from a closure. The closure reads what it needs
/// from the context synchronously and returns an owned future.
pub fn param_transform<F, Fut>(f: F) -> ParamTransform
where
    F: Fn(&RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, HttpError>> + Send + 'static,
{
    Arc::new(
        move |ctx: &RequestContext,
              value: Option<Value>|
              -> BoxFuture<'static, Result<Option<Value>, HttpError>> { Box::pin(f(ctx, value)) },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Greeter {
        greeting: &'static str,
    }

    #[tokio::test]
    async fn erased_method_receives_typed_controller() {
        let handler = method(|greeter: Arc<Greeter>, args: Args| async move {
            let name: String = args.get(0)?;
            Ok::<_, HttpError>(format!("{}, {}", greeter.greeting, name))
        });

        let instance: Instance = Arc::new(Greeter { greeting: "Hello" });
        let output = handler(instance, Args::new(vec![Some(json!("Bob"))]))
            .await
            .unwrap();
        assert_eq!(output, Output::Value(json!("Hello, Bob")));
    }

    #[tokio::test]
    async fn wrong_instance_type_fails() {
        let handler = method(|_: Arc<Greeter>, _args: Args| async move { Ok::<_, HttpError>(()) });
        let instance: Instance = Arc::new(5_u8);
        let err = handler(instance, Args::default()).await.unwrap_err();
        assert_eq!(err.status, http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
