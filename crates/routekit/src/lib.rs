//! # RouteKit
//!
//! Declarative controllers for Rust HTTP services.
//!
//! Controllers, actions, parameters, middlewares and interceptors are
//! declared as records in a [`MetadataStore`]. At startup the metadata is
//! compiled and every action is registered with a server adapter; at request
//! time the engine resolves the parameters, calls the action, runs the
//! interceptors and hands the result to the adapter for emission.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use routekit::prelude::*;
//!
//! #[derive(Default)]
//! struct UserController;
//!
//! fn declare(store: &MetadataStore) {
//!     store
//!         .register(ControllerDeclaration::json::<UserController>("/users"))
//!         .register(ActionDeclaration::get::<UserController>(
//!             "/:id",
//!             "get_one",
//!             method(|_: Arc<UserController>, args: Args| async move {
//!                 let id: i64 = args.get(0)?;
//!                 Ok::<_, HttpError>(json!({ "id": id }))
//!             }),
//!         ))
//!         .register(ParamDeclaration::param::<UserController>("get_one", 0, "id").typed(TargetType::Integer));
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     init_tracing();
//!     declare(&global_store());
//!
//!     let options = RoutingOptions::from_env()?
//!         .container(DefaultContainer::new().with(UserController));
//!     let driver = create_server(&options).await?;
//!     Arc::new(driver).serve("127.0.0.1:8080").await
//! }
//! ```

mod bootstrap;
pub mod config;

// Re-export core functionality
pub use routekit_core::*;

pub use bootstrap::{create_executor, create_server, init_tracing, DEFAULT_LOG_FILTER};
pub use config::{ConfigError, Environment, RoutingConfig, RoutingOptions};

/// Re-export of the `validator` crate for deriving parameter constraints
pub use validator;

/// Prelude module - import everything you need with `use routekit::prelude::*`
pub mod prelude {
    pub use crate::bootstrap::{create_executor, create_server, init_tracing};
    pub use crate::config::{Environment, RoutingConfig, RoutingOptions};
    pub use routekit_core::metadata::{MiddlewarePhase, OnEmpty, ParamKind, ResponseHandlerKind};
    pub use routekit_core::{
        append_params, global_store, method, method_override, param_transform, ActionDeclaration, Adapter, Args,
        AuthorizationChecker, ClassRef, ClassTransformOptions, Container, ControllerDeclaration, CurrentUserChecker,
        DefaultContainer, FnAuthorizationChecker, FnCurrentUserChecker, FnInterceptor, FnMiddleware, HttpError,
        HyperDriver, Interceptor, InterceptorDeclaration, InterceptorHandle, MetadataStore, Middleware,
        MiddlewareDeclaration, MiddlewareHandle, Model, Output, ParamDeclaration, RequestContext,
        ResponseHandlerDeclaration, Route, RoutingControllers, RoutingError, StatusCode, TargetType, UseDeclaration,
        Verb,
    };
    pub use routekit_validate::{FieldError, Validate, ValidationError};

    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Value};
    pub use std::sync::Arc;
    pub use validator::Validate as ValidatorValidate;
}
