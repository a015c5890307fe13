//! Server adapter interface.
//!
//! The engine never touches a server's native request or response. It hands
//! every action to the [`Adapter`] together with an [`ExecuteCallback`], and
//! the adapter calls back into the engine when a request for that action
//! arrives. Extraction and emission go through the adapter as well.

use crate::checker::{AuthorizationChecker, CurrentUserChecker};
use crate::container::{Container, DefaultContainer};
use crate::context::RequestContext;
use crate::error::{Result, RoutingError};
use crate::metadata::{ActionMetadata, ControllerMetadata, MiddlewareMetadata, ParamMetadata};
use crate::transform::ClassTransformOptions;
use crate::value::Output;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Runs one action for one request.
///
/// The adapter passes itself in, so the callback holds no reference back to
/// the adapter that stores it.
pub type ExecuteCallback<A> =
    Arc<dyn for<'a> Fn(&'a A, &'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync>;

/// Build an [`ExecuteCallback`] from a closure.
pub fn execute_callback<A, F>(f: F) -> ExecuteCallback<A>
where
    F: for<'a> Fn(&'a A, &'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Settings shared by every adapter.
#[derive(Clone)]
pub struct DriverSettings {
    /// Expose internal error details in responses
    pub development: bool,
    /// Emit error bodies; when off only the status is written
    pub default_error_handler: bool,
    /// Default for plain/object conversion of requests and responses
    pub class_transformer: bool,
    /// Default for parameter validation
    pub validation: bool,
    pub plain_to_class_options: ClassTransformOptions,
    pub class_to_plain_options: ClassTransformOptions,
    /// Prepended to every route and used as the mount path of global middlewares
    pub route_prefix: String,
    pub authorization_checker: Option<Arc<dyn AuthorizationChecker>>,
    pub current_user_checker: Option<Arc<dyn CurrentUserChecker>>,
    pub container: Arc<dyn Container>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            development: false,
            default_error_handler: true,
            class_transformer: true,
            validation: true,
            plain_to_class_options: ClassTransformOptions::default(),
            class_to_plain_options: ClassTransformOptions::default(),
            route_prefix: String::new(),
            authorization_checker: None,
            current_user_checker: None,
            container: Arc::new(DefaultContainer::new()),
        }
    }
}

impl fmt::Debug for DriverSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverSettings")
            .field("development", &self.development)
            .field("default_error_handler", &self.default_error_handler)
            .field("class_transformer", &self.class_transformer)
            .field("validation", &self.validation)
            .field("route_prefix", &self.route_prefix)
            .field("authorization_checker", &self.authorization_checker.is_some())
            .field("current_user_checker", &self.current_user_checker.is_some())
            .finish_non_exhaustive()
    }
}

/// One server backend.
#[async_trait]
pub trait Adapter: Send + Sync + Sized + 'static {
    fn settings(&self) -> &DriverSettings;

    fn settings_mut(&mut self) -> &mut DriverSettings;

    /// Prepare the underlying server.
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Mount a global middleware.
    fn register_middleware(&mut self, middleware: &MiddlewareMetadata) -> Result<()>;

    /// Bind an action to a concrete route.
    fn register_action(
        &mut self,
        controller: &ControllerMetadata,
        action: Arc<ActionMetadata>,
        execute: ExecuteCallback<Self>,
    ) -> Result<()>;

    /// Finalize route registration.
    fn register_routes(&mut self) -> Result<()> {
        Ok(())
    }

    /// Read the raw value of one parameter from the request.
    async fn get_param_from_request(&self, ctx: &RequestContext, param: &ParamMetadata) -> Result<Option<Value>>;

    /// Emit a successful result.
    async fn handle_success(&self, result: Output, action: &ActionMetadata, ctx: &mut RequestContext) -> Result<()>;

    /// Emit an error. `action` is `None` for errors raised outside an action.
    async fn handle_error(&self, error: RoutingError, action: Option<&ActionMetadata>, ctx: &mut RequestContext);
}
