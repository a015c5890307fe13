//! Interceptors.
//!
//! An interceptor receives the action result after the method returned and
//! before it is emitted, and returns the (possibly rewritten) result. The
//! engine runs them one at a time, highest priority first.

use crate::class::{ClassRef, Instance};
use crate::container::Container;
use crate::context::RequestContext;
use crate::error::{HttpError, Result, RoutingError};
use crate::value::Output;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, ctx: &mut RequestContext, result: Output) -> Result<Output, HttpError>;
}

/// Interceptor from a synchronous closure.
pub struct FnInterceptor<F> {
    f: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(&mut RequestContext, Output) -> Result<Output, HttpError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut RequestContext, Output) -> Result<Output, HttpError> + Send + Sync + 'static,
{
    async fn intercept(&self, ctx: &mut RequestContext, result: Output) -> Result<Output, HttpError> {
        (self.f)(ctx, result)
    }
}

type InterceptorCast = fn(Instance) -> Option<Arc<dyn Interceptor>>;

fn cast_interceptor<T: Interceptor>(instance: Instance) -> Option<Arc<dyn Interceptor>> {
    instance
        .downcast::<T>()
        .ok()
        .map(|interceptor| interceptor as Arc<dyn Interceptor>)
}

/// How a declared interceptor is obtained at run time.
#[derive(Clone)]
pub enum InterceptorHandle {
    /// Resolved through the container on every call
    Class { class: ClassRef, cast: InterceptorCast },
    /// A ready instance
    Instance {
        name: String,
        interceptor: Arc<dyn Interceptor>,
    },
}

impl InterceptorHandle {
    pub fn of<T: Interceptor>() -> Self {
        InterceptorHandle::Class {
            class: ClassRef::of::<T>(),
            cast: cast_interceptor::<T>,
        }
    }

    pub fn instance<I: Interceptor>(interceptor: I) -> Self {
        InterceptorHandle::Instance {
            name: std::any::type_name::<I>().to_string(),
            interceptor: Arc::new(interceptor),
        }
    }

    /// Class behind the handle, if it is resolved through the container
    pub fn class(&self) -> Option<ClassRef> {
        match self {
            InterceptorHandle::Class { class, .. } => Some(*class),
            InterceptorHandle::Instance { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            InterceptorHandle::Class { class, .. } => class.short_name(),
            InterceptorHandle::Instance { name, .. } => name,
        }
    }

    pub fn resolve(
        &self,
        container: &dyn Container,
        ctx: Option<&RequestContext>,
    ) -> Result<Arc<dyn Interceptor>> {
        match self {
            InterceptorHandle::Class { class, cast } => {
                let instance = container.get(class, ctx)?;
                cast(instance).ok_or_else(|| {
                    RoutingError::configuration(format!(
                        "Container returned an instance of the wrong type for interceptor {}",
                        class.name()
                    ))
                })
            }
            InterceptorHandle::Instance { interceptor, .. } => Ok(interceptor.clone()),
        }
    }
}

impl fmt::Debug for InterceptorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterceptorHandle({})", self.name())
    }
}
