use super::{ActionMetadata, InterceptorMetadata, ResponseHandlerKind, UseMetadata};
use crate::class::{ClassRef, Instance};
use crate::container::Container;
use crate::context::RequestContext;
use crate::error::Result;
use crate::route::Route;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Controller flavour. Json controllers serialize every result as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerKind {
    #[default]
    Default,
    Json,
}

/// Option bag shared by controllers and actions. Action values override
/// controller values; unset values fall back to the driver settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerOptions {
    pub transform_request: Option<bool>,
    pub transform_response: Option<bool>,
}

impl ControllerOptions {
    /// `other` layered on top of `self`.
    pub fn merged(&self, other: &ControllerOptions) -> ControllerOptions {
        ControllerOptions {
            transform_request: other.transform_request.or(self.transform_request),
            transform_response: other.transform_response.or(self.transform_response),
        }
    }
}

/// One declared controller.
#[derive(Debug, Clone)]
pub struct ControllerMetadata {
    pub target: ClassRef,
    pub route: Route,
    pub kind: ControllerKind,
    pub options: ControllerOptions,
    pub actions: Vec<Arc<ActionMetadata>>,
    /// Middlewares attached to every action of the controller
    pub uses: Vec<UseMetadata>,
    /// Interceptors attached to every action of the controller
    pub interceptors: Vec<InterceptorMetadata>,
    pub is_authorized_used: bool,
    pub authorized_roles: Vec<String>,
}

impl ControllerMetadata {
    pub(crate) fn new(target: ClassRef, route: Route, kind: ControllerKind, options: ControllerOptions) -> Self {
        Self {
            target,
            route,
            kind,
            options,
            actions: Vec::new(),
            uses: Vec::new(),
            interceptors: Vec::new(),
            is_authorized_used: false,
            authorized_roles: Vec::new(),
        }
    }

    /// Apply controller-scoped response handlers.
    pub(crate) fn build(&mut self, handlers: &[&ResponseHandlerKind]) {
        let authorized = handlers.iter().find_map(|handler| match handler {
            ResponseHandlerKind::Authorized(roles) => Some(roles),
            _ => None,
        });
        self.is_authorized_used = authorized.is_some();
        self.authorized_roles = authorized.cloned().unwrap_or_default();
    }

    pub fn is_json(&self) -> bool {
        self.kind == ControllerKind::Json
    }

    /// Controller instance for a request.
    pub fn instance(&self, container: &dyn Container, ctx: Option<&RequestContext>) -> Result<Instance> {
        container.get(&self.target, ctx)
    }
}
