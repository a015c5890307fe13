//! Middlewares.
//!
//! A middleware runs around action execution with mutable access to the
//! request context. It may decorate the context (session, state, response
//! headers), emit a response itself to end the request, or fail.

use crate::class::{ClassRef, Instance};
use crate::container::Container;
use crate::context::RequestContext;
use crate::error::{HttpError, Result, RoutingError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), HttpError>;
}

/// Middleware from a synchronous closure.
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> Result<(), HttpError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> Result<(), HttpError> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), HttpError> {
        (self.f)(ctx)
    }
}

type MiddlewareCast = fn(Instance) -> Option<Arc<dyn Middleware>>;

fn cast_middleware<T: Middleware>(instance: Instance) -> Option<Arc<dyn Middleware>> {
    instance
        .downcast::<T>()
        .ok()
        .map(|middleware| middleware as Arc<dyn Middleware>)
}

/// How a declared middleware is obtained at run time.
#[derive(Clone)]
pub enum MiddlewareHandle {
    /// Resolved through the container on use
    Class { class: ClassRef, cast: MiddlewareCast },
    /// A ready instance
    Instance {
        name: String,
        middleware: Arc<dyn Middleware>,
    },
}

impl MiddlewareHandle {
    pub fn of<T: Middleware>() -> Self {
        MiddlewareHandle::Class {
            class: ClassRef::of::<T>(),
            cast: cast_middleware::<T>,
        }
    }

    pub fn instance<M: Middleware>(middleware: M) -> Self {
        MiddlewareHandle::Instance {
            name: std::any::type_name::<M>().to_string(),
            middleware: Arc::new(middleware),
        }
    }

    /// Class behind the handle, if it is resolved through the container
    pub fn class(&self) -> Option<ClassRef> {
        match self {
            MiddlewareHandle::Class { class, .. } => Some(*class),
            MiddlewareHandle::Instance { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MiddlewareHandle::Class { class, .. } => class.short_name(),
            MiddlewareHandle::Instance { name, .. } => name,
        }
    }

    pub fn resolve(
        &self,
        container: &dyn Container,
        ctx: Option<&RequestContext>,
    ) -> Result<Arc<dyn Middleware>> {
        match self {
            MiddlewareHandle::Class { class, cast } => {
                let instance = container.get(class, ctx)?;
                cast(instance).ok_or_else(|| {
                    RoutingError::configuration(format!(
                        "Container returned an instance of the wrong type for middleware {}",
                        class.name()
                    ))
                })
            }
            MiddlewareHandle::Instance { middleware, .. } => Ok(middleware.clone()),
        }
    }
}

impl fmt::Debug for MiddlewareHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MiddlewareHandle({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::DefaultContainer;
    use bytes::Bytes;
    use serde_json::json;

    struct Session;

    #[async_trait]
    impl Middleware for Session {
        async fn handle(&self, ctx: &mut RequestContext) -> Result<(), HttpError> {
            ctx.set_session(json!({"user": "alice"}));
            Ok(())
        }
    }

    fn context() -> RequestContext {
        RequestContext::from_request(http::Request::new(Bytes::new()))
    }

    #[tokio::test]
    async fn class_handle_resolves_through_container() {
        let container = DefaultContainer::new().with(Session);
        let handle = MiddlewareHandle::of::<Session>();
        assert_eq!(handle.name(), "Session");

        let middleware = handle.resolve(&container, None).unwrap();
        let mut ctx = context();
        middleware.handle(&mut ctx).await.unwrap();
        assert_eq!(ctx.session(), Some(&json!({"user": "alice"})));
    }

    #[tokio::test]
    async fn closure_middleware_can_fail() {
        let handle = MiddlewareHandle::instance(FnMiddleware::new(|_ctx| {
            Err(HttpError::forbidden("nope"))
        }));
        let middleware = handle.resolve(&DefaultContainer::new(), None).unwrap();
        let err = middleware.handle(&mut context()).await.unwrap_err();
        assert_eq!(err.status, http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn unresolvable_class_is_a_configuration_error() {
        let handle = MiddlewareHandle::of::<Session>();
        let err = handle.resolve(&DefaultContainer::new(), None).err().unwrap();
        assert!(matches!(err, RoutingError::Configuration(_)));
    }
}
