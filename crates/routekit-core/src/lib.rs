//! # RouteKit Core
//!
//! The controller engine behind RouteKit: the declaration store, the
//! metadata builder, parameter resolution, the action pipeline and the hyper
//! adapter.
//!
//! This crate is not meant to be used directly. Use `routekit` instead.

mod adapter;
mod builder;
mod checker;
mod class;
mod container;
mod context;
mod driver;
mod engine;
mod error;
mod handler;
mod interceptor;
pub mod metadata;
mod middleware;
mod param_handler;
mod route;
mod store;
mod transform;
mod value;

#[cfg(test)]
mod testing;

// Public API
pub use adapter::{execute_callback, Adapter, DriverSettings, ExecuteCallback};
pub use builder::{MetadataBuilder, ParamOptions, RoutingDefaults};
pub use checker::{AuthorizationChecker, CurrentUserChecker, FnAuthorizationChecker, FnCurrentUserChecker};
pub use class::{ClassRef, Instance};
pub use container::{Container, DefaultContainer};
pub use context::{RequestContext, Response, UploadedFile};
pub use driver::{
    HyperDriver, Multipart, MultipartConfig, MultipartParser, TemplateRenderer, TestClient, TestRequest,
    TestResponse, DEFAULT_BODY_LIMIT, DEFAULT_MAX_FIELDS, DEFAULT_MAX_SIZE,
};
pub use engine::{ActionExecutor, RoutingControllers};
pub use error::{HttpError, Result, RoutingError};
pub use handler::{
    append_params, method, method_override, param_transform, AppendParams, MethodHandler, MethodOverride,
    ParamTransform,
};
pub use interceptor::{FnInterceptor, Interceptor, InterceptorHandle};
pub use middleware::{FnMiddleware, Middleware, MiddlewareHandle};
pub use param_handler::ActionParameterHandler;
pub use route::{Route, Verb};
pub use routekit_validate::{FieldError, ValidationError};
pub use store::{
    global_store, ActionDeclaration, ControllerDeclaration, Declaration, Declarations, InterceptorDeclaration,
    MetadataStore, MiddlewareDeclaration, ParamDeclaration, ResponseHandlerDeclaration, UseDeclaration, UseKind,
};
pub use transform::{ClassTransformOptions, Model, ObjectType, TargetType};
pub use value::{Args, Output};

pub use http::{Method, StatusCode};
