use crate::class::ClassRef;
use crate::interceptor::InterceptorHandle;
use crate::middleware::MiddlewareHandle;

/// When a middleware runs relative to the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MiddlewarePhase {
    #[default]
    Before,
    After,
}

/// A declared middleware class.
#[derive(Debug, Clone)]
pub struct MiddlewareMetadata {
    pub target: ClassRef,
    pub handle: MiddlewareHandle,
    /// Global middlewares run for every request under the route prefix
    pub global: bool,
    pub phase: MiddlewarePhase,
    /// Higher runs earlier
    pub priority: i32,
}

/// A declared interceptor, global or attached to a controller or action.
#[derive(Debug, Clone)]
pub struct InterceptorMetadata {
    /// Interceptor class, or the owning controller for attached interceptors
    pub target: ClassRef,
    pub method: Option<String>,
    pub handle: InterceptorHandle,
    pub global: bool,
    /// Higher runs earlier
    pub priority: i32,
}

/// A middleware attached to a controller or action.
#[derive(Debug, Clone)]
pub struct UseMetadata {
    pub target: ClassRef,
    pub method: Option<String>,
    pub handle: MiddlewareHandle,
    pub after: bool,
}
