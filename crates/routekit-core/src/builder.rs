//! Metadata builder.
//!
//! Compiles the raw declarations of a [`MetadataStore`] into the metadata
//! graph: controllers with their actions, actions with their parameters in
//! index order, and the middleware and interceptor lists. Declarations whose
//! owner does not exist (a parameter without an action, an action without a
//! controller) are dropped.

use crate::class::ClassRef;
use crate::metadata::{
    ActionMetadata, ControllerMetadata, InterceptorMetadata, MiddlewareMetadata, ParamMetadata,
    ResponseHandlerKind, UseMetadata,
};
use crate::store::{Declarations, MetadataStore, ParamDeclaration, UseKind};
use crate::transform::TargetType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Defaults applied while building metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingDefaults {
    /// Status for null results when the action declares none
    pub null_result_code: Option<u16>,
    /// Status for undefined results when the action declares none
    pub undefined_result_code: Option<u16>,
    pub param_options: ParamOptions,
}

/// Parameter defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamOptions {
    /// Used when a parameter declaration leaves `required` unset
    pub required: Option<bool>,
}

pub struct MetadataBuilder<'a> {
    store: &'a MetadataStore,
    defaults: &'a RoutingDefaults,
}

impl<'a> MetadataBuilder<'a> {
    pub fn new(store: &'a MetadataStore, defaults: &'a RoutingDefaults) -> Self {
        Self { store, defaults }
    }

    /// Build controllers, optionally restricted to `classes`.
    pub fn build_controller_metadata(&self, classes: Option<&[ClassRef]>) -> Vec<ControllerMetadata> {
        let declarations = self.store.snapshot();

        declarations
            .controllers
            .iter()
            .filter(|controller| includes(classes, &controller.target))
            .map(|declaration| {
                let mut controller = ControllerMetadata::new(
                    declaration.target,
                    declaration.route.clone(),
                    declaration.kind,
                    declaration.options.clone(),
                );
                let handlers = response_handlers(&declarations, &declaration.target, None);
                controller.build(&handlers);
                controller.uses = create_uses(&declarations, &declaration.target, None);
                controller.interceptors = create_interceptor_uses(&declarations, &declaration.target, None);
                controller.actions = self.create_actions(&declarations, &controller);
                controller
            })
            .collect()
    }

    /// Build middleware metadata, optionally restricted to `classes`.
    pub fn build_middleware_metadata(&self, classes: Option<&[ClassRef]>) -> Vec<MiddlewareMetadata> {
        self.store
            .snapshot()
            .middlewares
            .into_iter()
            .filter(|middleware| includes(classes, &middleware.target))
            .map(|declaration| MiddlewareMetadata {
                target: declaration.target,
                handle: declaration.handle,
                global: declaration.global,
                phase: declaration.phase,
                priority: declaration.priority,
            })
            .collect()
    }

    /// Build interceptor metadata, optionally restricted to `classes`.
    pub fn build_interceptor_metadata(&self, classes: Option<&[ClassRef]>) -> Vec<InterceptorMetadata> {
        self.store
            .snapshot()
            .interceptors
            .into_iter()
            .filter(|interceptor| includes(classes, &interceptor.target))
            .map(|declaration| InterceptorMetadata {
                target: declaration.target,
                method: None,
                handle: declaration.handle,
                global: declaration.global,
                priority: declaration.priority,
            })
            .collect()
    }

    fn create_actions(&self, declarations: &Declarations, controller: &ControllerMetadata) -> Vec<Arc<ActionMetadata>> {
        declarations
            .actions
            .iter()
            .filter(|action| action.target == controller.target)
            .map(|action| {
                let method = Some(action.method.as_str());
                let params = declarations
                    .params
                    .iter()
                    .filter(|param| param.target == action.target && param.method == action.method)
                    .map(|param| self.create_param(param))
                    .collect();
                let handlers = response_handlers(declarations, &action.target, method);
                Arc::new(ActionMetadata::build(
                    controller,
                    action,
                    params,
                    create_uses(declarations, &action.target, method),
                    create_interceptor_uses(declarations, &action.target, method),
                    &handlers,
                    self.defaults,
                ))
            })
            .collect()
    }

    fn create_param(&self, declaration: &ParamDeclaration) -> ParamMetadata {
        let required = declaration
            .required
            .or(self.defaults.param_options.required)
            .unwrap_or(false);

        ParamMetadata {
            target: declaration.target,
            method: declaration.method.clone(),
            index: declaration.index,
            kind: declaration.kind,
            name: declaration.name.clone(),
            required,
            parse: declaration.parse,
            is_array: declaration.is_array,
            target_type: declaration.target_type.clone().unwrap_or(TargetType::Any),
            transform: declaration.transform.clone(),
            validate: declaration.validate,
            class_transform: declaration.class_transform.clone(),
            extra_options: declaration.extra_options.clone(),
        }
    }
}

fn includes(classes: Option<&[ClassRef]>, target: &ClassRef) -> bool {
    classes.map_or(true, |classes| classes.contains(target))
}

fn scope_matches(owner: &ClassRef, owner_method: Option<&str>, target: &ClassRef, method: Option<&str>) -> bool {
    owner == target && owner_method == method
}

fn response_handlers<'d>(
    declarations: &'d Declarations,
    target: &ClassRef,
    method: Option<&str>,
) -> Vec<&'d ResponseHandlerKind> {
    declarations
        .response_handlers
        .iter()
        .filter(|handler| scope_matches(&handler.target, handler.method.as_deref(), target, method))
        .map(|handler| &handler.kind)
        .collect()
}

fn create_uses(declarations: &Declarations, target: &ClassRef, method: Option<&str>) -> Vec<UseMetadata> {
    declarations
        .uses
        .iter()
        .filter(|use_| scope_matches(&use_.target, use_.method.as_deref(), target, method))
        .filter_map(|use_| match &use_.kind {
            UseKind::Middleware { handle, after } => Some(UseMetadata {
                target: use_.target,
                method: use_.method.clone(),
                handle: handle.clone(),
                after: *after,
            }),
            UseKind::Interceptor(_) => None,
        })
        .collect()
}

fn create_interceptor_uses(
    declarations: &Declarations,
    target: &ClassRef,
    method: Option<&str>,
) -> Vec<InterceptorMetadata> {
    declarations
        .uses
        .iter()
        .filter(|use_| scope_matches(&use_.target, use_.method.as_deref(), target, method))
        .filter_map(|use_| match &use_.kind {
            UseKind::Interceptor(handle) => Some(InterceptorMetadata {
                target: use_.target,
                method: use_.method.clone(),
                handle: handle.clone(),
                global: false,
                priority: 0,
            }),
            UseKind::Middleware { .. } => None,
        })
        .collect()
}
