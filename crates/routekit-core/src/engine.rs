//! Execution engine.
//!
//! [`RoutingControllers`] wires the compiled metadata into an [`Adapter`]:
//! global interceptors and middlewares in priority order, and one
//! [`ActionExecutor`] per action. An executor runs the request pipeline:
//! parameters, handler, interceptors, then success or error emission.

use crate::adapter::{execute_callback, Adapter, ExecuteCallback};
use crate::builder::{MetadataBuilder, RoutingDefaults};
use crate::class::ClassRef;
use crate::context::RequestContext;
use crate::error::{Result, RoutingError};
use crate::metadata::{ActionMetadata, ControllerMetadata, InterceptorMetadata, MiddlewarePhase};
use crate::param_handler::ActionParameterHandler;
use crate::store::MetadataStore;
use crate::value::{Args, Output};
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs the pipeline of one action.
pub struct ActionExecutor {
    action: Arc<ActionMetadata>,
    /// Merged global, controller and action interceptors, highest priority first
    interceptors: Vec<InterceptorMetadata>,
}

impl ActionExecutor {
    pub fn new(action: Arc<ActionMetadata>, interceptors: Vec<InterceptorMetadata>) -> Self {
        Self { action, interceptors }
    }

    pub fn action(&self) -> &ActionMetadata {
        &self.action
    }

    pub fn interceptors(&self) -> &[InterceptorMetadata] {
        &self.interceptors
    }

    /// Execute the action for the request in `ctx`.
    ///
    /// Runs at most once per context; later calls return immediately.
    pub async fn execute<A: Adapter>(&self, driver: &A, ctx: &mut RequestContext) {
        if !ctx.begin_execution() {
            debug!(action = %self.action.display_name(), "Request already executed, skipping");
            return;
        }

        if let Err(err) = self.run(driver, ctx).await {
            driver.handle_error(err, Some(&self.action), ctx).await;
        }
    }

    async fn run<A: Adapter>(&self, driver: &A, ctx: &mut RequestContext) -> Result<()> {
        let action = self.action.as_ref();
        let params = {
            let ctx: &RequestContext = ctx;
            let handler = ActionParameterHandler::new(driver);
            try_join_all(action.params.iter().map(|param| handler.handle(ctx, action, param))).await?
        };

        let values = match &action.append_params {
            Some(append) => {
                let mut values = append(ctx);
                values.extend(params);
                values
            }
            None => params,
        };
        let args = Args::new(values);

        let container = driver.settings().container.clone();
        let result = match &action.method_override {
            Some(hook) => hook(action, ctx, args).await,
            None => {
                let instance = container.get(&action.target, Some(&*ctx))?;
                action.call_method(instance, args).await
            }
        }
        .map_err(RoutingError::Handler)?;

        let result = self.intercept(driver, ctx, result).await?;
        driver.handle_success(result, action, ctx).await
    }

    async fn intercept<A: Adapter>(&self, driver: &A, ctx: &mut RequestContext, mut result: Output) -> Result<Output> {
        if self.interceptors.is_empty() {
            return Ok(result);
        }
        let container = driver.settings().container.clone();
        for metadata in &self.interceptors {
            let interceptor = metadata.handle.resolve(container.as_ref(), Some(&*ctx))?;
            result = interceptor
                .intercept(ctx, result)
                .await
                .map_err(RoutingError::Interceptor)?;
        }
        Ok(result)
    }
}

/// Registers controllers, middlewares and interceptors with an adapter.
pub struct RoutingControllers<A: Adapter> {
    driver: A,
    store: Arc<MetadataStore>,
    defaults: RoutingDefaults,
    /// Global interceptors, highest priority first
    interceptors: Vec<InterceptorMetadata>,
}

impl<A: Adapter> RoutingControllers<A> {
    pub fn new(driver: A, store: Arc<MetadataStore>, defaults: RoutingDefaults) -> Self {
        Self {
            driver,
            store,
            defaults,
            interceptors: Vec::new(),
        }
    }

    pub fn driver(&self) -> &A {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut A {
        &mut self.driver
    }

    pub fn into_driver(self) -> A {
        self.driver
    }

    /// Global interceptors registered so far, in execution order.
    pub fn interceptors(&self) -> &[InterceptorMetadata] {
        &self.interceptors
    }

    pub async fn initialize(&mut self) -> Result<&mut Self> {
        self.driver.initialize().await?;
        Ok(self)
    }

    /// Add global interceptors. Repeated calls accumulate.
    pub fn register_interceptors(&mut self, classes: Option<&[ClassRef]>) -> &mut Self {
        let mut interceptors = self.builder().build_interceptor_metadata(classes);
        sort_by_priority(&mut interceptors);
        debug!(count = interceptors.len(), "Registered global interceptors");
        self.interceptors.extend(interceptors);
        self
    }

    /// Register every action of the selected controllers, then finalize routes.
    pub fn register_controllers(&mut self, classes: Option<&[ClassRef]>) -> Result<&mut Self> {
        let controllers = self.builder().build_controller_metadata(classes);
        for controller in &controllers {
            for action in &controller.actions {
                let interceptors = self.prepare_interceptors(controller, action);
                let executor = Arc::new(ActionExecutor::new(action.clone(), interceptors));
                let callback: ExecuteCallback<A> = execute_callback(move |driver: &A, ctx: &mut RequestContext| {
                    let executor = executor.clone();
                    Box::pin(async move { executor.execute(driver, ctx).await })
                });
                debug!(
                    action = %action.display_name(),
                    verb = %action.verb,
                    route = %action.full_route,
                    "Registering action"
                );
                self.driver.register_action(controller, action.clone(), callback)?;
            }
        }
        self.driver.register_routes()?;
        info!(controllers = controllers.len(), "Controllers registered");
        Ok(self)
    }

    /// Register global middlewares of one phase, highest priority first.
    pub fn register_middlewares(&mut self, phase: MiddlewarePhase, classes: Option<&[ClassRef]>) -> Result<&mut Self> {
        let mut middlewares: Vec<_> = self
            .builder()
            .build_middleware_metadata(classes)
            .into_iter()
            .filter(|middleware| middleware.global && middleware.phase == phase)
            .collect();
        middlewares.sort_by(|a, b| b.priority.cmp(&a.priority));
        for middleware in &middlewares {
            debug!(middleware = middleware.handle.name(), priority = middleware.priority, ?phase, "Registering middleware");
            self.driver.register_middleware(middleware)?;
        }
        Ok(self)
    }

    fn builder(&self) -> MetadataBuilder<'_> {
        MetadataBuilder::new(&self.store, &self.defaults)
    }

    fn prepare_interceptors(&self, controller: &ControllerMetadata, action: &ActionMetadata) -> Vec<InterceptorMetadata> {
        let mut interceptors: Vec<InterceptorMetadata> = self
            .interceptors
            .iter()
            .chain(&controller.interceptors)
            .chain(&action.interceptors)
            .cloned()
            .collect();
        sort_by_priority(&mut interceptors);
        interceptors
    }
}

/// Highest priority first; equal priorities keep their relative order.
fn sort_by_priority(interceptors: &mut [InterceptorMetadata]) {
    interceptors.sort_by(|a, b| b.priority.cmp(&a.priority));
}
