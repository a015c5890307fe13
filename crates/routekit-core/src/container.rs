//! Instance container.
//!
//! Controllers, middlewares and interceptors are declared by type. The
//! container turns a [`ClassRef`] into an [`Instance`] whenever the pipeline
//! needs one. Whether that instance is a singleton or built per request is the
//! container's business.

use crate::class::{ClassRef, Instance};
use crate::context::RequestContext;
use crate::error::{Result, RoutingError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Resolves declared types into instances.
pub trait Container: Send + Sync {
    /// Get the instance for `class`. `ctx` is the current request, if any.
    fn get(&self, class: &ClassRef, ctx: Option<&RequestContext>) -> Result<Instance>;
}

type Factory = Arc<dyn Fn(Option<&RequestContext>) -> Instance + Send + Sync>;

#[derive(Clone)]
enum Provider {
    Singleton(Instance),
    Factory(Factory),
}

/// Map-backed container with explicit providers.
///
/// ```rust,ignore
/// let container = DefaultContainer::new()
///     .with(UserController::default())
///     .with(LoggingMiddleware);
/// ```
#[derive(Default)]
pub struct DefaultContainer {
    providers: RwLock<HashMap<ClassRef, Provider>>,
}

impl DefaultContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a singleton (builder form).
    pub fn with<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.provide(value);
        self
    }

    /// Register a singleton.
    pub fn provide<T: Send + Sync + 'static>(&self, value: T) {
        self.insert(ClassRef::of::<T>(), Provider::Singleton(Arc::new(value)));
    }

    /// Register a shared singleton the caller keeps a handle to.
    pub fn provide_arc<T: Send + Sync + 'static>(&self, value: Arc<T>) {
        self.insert(ClassRef::of::<T>(), Provider::Singleton(value));
    }

    /// Register a factory invoked on every resolution.
    pub fn provide_with<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(Option<&RequestContext>) -> T + Send + Sync + 'static,
    {
        self.insert(
            ClassRef::of::<T>(),
            Provider::Factory(Arc::new(move |ctx| Arc::new(factory(ctx)) as Instance)),
        );
    }

    /// Register `T::default()` as a singleton.
    pub fn provide_default<T: Default + Send + Sync + 'static>(&self) {
        self.provide(T::default());
    }

    pub fn contains(&self, class: &ClassRef) -> bool {
        self.providers
            .read()
            .map(|providers| providers.contains_key(class))
            .unwrap_or(false)
    }

    fn insert(&self, class: ClassRef, provider: Provider) {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        if providers.insert(class, provider).is_some() {
            tracing::debug!(class = %class, "Replaced container provider");
        }
    }
}

impl Container for DefaultContainer {
    fn get(&self, class: &ClassRef, ctx: Option<&RequestContext>) -> Result<Instance> {
        let provider = {
            let providers = self.providers.read().map_err(|e| {
                RoutingError::configuration(format!("Failed to acquire container lock: {}", e))
            })?;
            providers.get(class).cloned()
        };
        match provider {
            Some(Provider::Singleton(instance)) => Ok(instance),
            Some(Provider::Factory(factory)) => Ok(factory(ctx)),
            None => Err(RoutingError::configuration(format!(
                "No provider registered for {}",
                class.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Service {
        id: usize,
    }

    struct Missing;

    #[test]
    fn singleton_is_shared() {
        let container = DefaultContainer::new().with(Service { id: 7 });
        let a = container.get(&ClassRef::of::<Service>(), None).unwrap();
        let b = container.get(&ClassRef::of::<Service>(), None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.downcast::<Service>().unwrap().id, 7);
    }

    #[test]
    fn factory_runs_per_resolution() {
        let counter = Arc::new(AtomicUsize::new(0));
        let container = DefaultContainer::new();
        let seen = counter.clone();
        container.provide_with(move |_| Service {
            id: seen.fetch_add(1, Ordering::SeqCst),
        });

        let first = container.get(&ClassRef::of::<Service>(), None).unwrap();
        let second = container.get(&ClassRef::of::<Service>(), None).unwrap();
        assert_eq!(first.downcast::<Service>().unwrap().id, 0);
        assert_eq!(second.downcast::<Service>().unwrap().id, 1);
    }

    #[test]
    fn missing_provider_is_a_configuration_error() {
        let container = DefaultContainer::new();
        let err = container.get(&ClassRef::of::<Missing>(), None).unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
        assert!(!container.contains(&ClassRef::of::<Missing>()));
    }
}
