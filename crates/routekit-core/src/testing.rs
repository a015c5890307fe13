//! In-crate test adapter.

use crate::adapter::{Adapter, DriverSettings, ExecuteCallback};
use crate::builder::RoutingDefaults;
use crate::class::ClassRef;
use crate::context::RequestContext;
use crate::error::{HttpError, Result, RoutingError};
use crate::handler::method;
use crate::metadata::{
    ActionMetadata, ControllerKind, ControllerMetadata, ControllerOptions, MiddlewareMetadata, ParamMetadata,
};
use crate::route::Route;
use crate::store::ActionDeclaration;
use crate::value::{Args, Output};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) struct Probe;

/// A JSON action on `Probe` with the given parameters.
pub(crate) fn action_with(params: Vec<ParamMetadata>) -> ActionMetadata {
    let controller = ControllerMetadata::new(
        ClassRef::of::<Probe>(),
        Route::from("/probe"),
        ControllerKind::Json,
        ControllerOptions::default(),
    );
    let declaration = ActionDeclaration::get::<Probe>(
        "/",
        "run",
        method(|_: Arc<Probe>, _args: Args| async move { Ok::<_, HttpError>(()) }),
    );
    ActionMetadata::build(
        &controller,
        &declaration,
        params,
        Vec::new(),
        Vec::new(),
        &[],
        &RoutingDefaults::default(),
    )
}

/// Adapter that serves parameter values from a map and records emissions.
#[derive(Default)]
pub(crate) struct MockAdapter {
    settings: DriverSettings,
    values: HashMap<String, Value>,
    delays: HashMap<String, u64>,
    failing: HashSet<String>,
    pub middlewares: Vec<String>,
    pub routes: Vec<(Arc<ActionMetadata>, ExecuteCallback<MockAdapter>)>,
    pub routes_finalized: bool,
    pub successes: Mutex<Vec<Output>>,
    pub errors: Mutex<Vec<RoutingError>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context() -> RequestContext {
        RequestContext::from_request(http::Request::new(Bytes::new()))
    }

    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    /// Delay extraction of `name` by `millis`.
    pub fn with_delay(mut self, name: &str, millis: u64) -> Self {
        self.delays.insert(name.to_string(), millis);
        self
    }

    /// Fail extraction of `name`.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Run the route registered for `method` against `ctx`.
    pub async fn dispatch(&self, method: &str, ctx: &mut RequestContext) {
        let (_, execute) = self
            .routes
            .iter()
            .find(|(action, _)| action.method == method)
            .unwrap_or_else(|| panic!("no route registered for {method}"));
        execute(self, ctx).await;
    }

    pub fn success_count(&self) -> usize {
        self.successes.lock().unwrap().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut DriverSettings {
        &mut self.settings
    }

    fn register_middleware(&mut self, middleware: &MiddlewareMetadata) -> Result<()> {
        self.middlewares.push(middleware.handle.name().to_string());
        Ok(())
    }

    fn register_action(
        &mut self,
        _controller: &ControllerMetadata,
        action: Arc<ActionMetadata>,
        execute: ExecuteCallback<Self>,
    ) -> Result<()> {
        self.routes.push((action, execute));
        Ok(())
    }

    fn register_routes(&mut self) -> Result<()> {
        self.routes_finalized = true;
        Ok(())
    }

    async fn get_param_from_request(&self, _ctx: &RequestContext, param: &ParamMetadata) -> Result<Option<Value>> {
        let name = param.display_name();
        if let Some(millis) = self.delays.get(name) {
            tokio::time::sleep(Duration::from_millis(*millis)).await;
        }
        if self.failing.contains(name) {
            return Err(RoutingError::Extraction {
                param: name.to_string(),
                message: "malformed".to_string(),
            });
        }
        Ok(self.values.get(name).cloned())
    }

    async fn handle_success(&self, result: Output, _action: &ActionMetadata, _ctx: &mut RequestContext) -> Result<()> {
        self.successes.lock().unwrap().push(result);
        Ok(())
    }

    async fn handle_error(&self, error: RoutingError, _action: Option<&ActionMetadata>, ctx: &mut RequestContext) {
        ctx.mark_failed();
        self.errors.lock().unwrap().push(error);
    }
}
