//! Startup helpers.

use crate::config::RoutingOptions;
use routekit_core::metadata::MiddlewarePhase;
use routekit_core::{global_store, Adapter, HyperDriver, Result, RoutingControllers};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,routekit=debug";

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}

/// Apply `options` to `driver` and register everything with it.
///
/// Registration order: interceptors, `before` middlewares, controllers,
/// `after` middlewares.
pub async fn create_executor<A: Adapter>(mut driver: A, options: &RoutingOptions) -> Result<RoutingControllers<A>> {
    options.apply(driver.settings_mut());
    let store = options.store.clone().unwrap_or_else(global_store);

    let mut engine = RoutingControllers::new(driver, store, options.config.defaults());
    engine.initialize().await?;
    engine.register_interceptors(options.interceptors.as_deref());
    engine.register_middlewares(MiddlewarePhase::Before, options.middlewares.as_deref())?;
    engine.register_controllers(options.controllers.as_deref())?;
    engine.register_middlewares(MiddlewarePhase::After, options.middlewares.as_deref())?;
    Ok(engine)
}

/// A [`HyperDriver`] with every selected controller registered.
///
/// ```rust,ignore
/// let driver = create_server(&RoutingOptions::from_env()?).await?;
/// Arc::new(driver).serve("127.0.0.1:8080").await?;
/// ```
pub async fn create_server(options: &RoutingOptions) -> Result<HyperDriver> {
    let mut driver = HyperDriver::new();
    if let Some(limit) = options.config.body_limit {
        driver = driver.body_limit(limit);
    }
    let engine = create_executor(driver, options).await?;
    let driver = engine.into_driver();
    info!(routes = driver.route_count(), prefix = %options.config.route_prefix, "Server created");
    Ok(driver)
}
