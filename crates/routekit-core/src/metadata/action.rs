use super::{
    ControllerMetadata, ControllerOptions, InterceptorMetadata, OnEmpty, ParamKind, ParamMetadata,
    ResponseHandlerKind, UseMetadata,
};
use crate::builder::RoutingDefaults;
use crate::class::{ClassRef, Instance};
use crate::error::HttpError;
use crate::handler::{AppendParams, MethodHandler, MethodOverride};
use crate::route::{Route, Verb};
use crate::store::ActionDeclaration;
use crate::transform::{ClassTransformOptions, ObjectType};
use crate::value::{Args, Output};
use http::StatusCode;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One controller method bound to a verb and route.
#[derive(Clone)]
pub struct ActionMetadata {
    pub target: ClassRef,
    pub method: String,
    pub verb: Verb,
    pub route: Route,
    /// Controller base route joined with the action route
    pub full_route: Route,
    /// Controller options overridden by action options
    pub options: ControllerOptions,
    /// Sorted by ascending index
    pub params: Vec<ParamMetadata>,
    pub uses: Vec<UseMetadata>,
    pub interceptors: Vec<InterceptorMetadata>,

    pub is_json_typed: bool,
    pub success_http_code: Option<StatusCode>,
    pub undefined_result: Option<OnEmpty>,
    pub null_result: Option<OnEmpty>,
    pub redirect: Option<String>,
    pub rendered_template: Option<String>,
    /// Response headers in declaration order
    pub headers: Vec<(String, String)>,
    pub response_class_transform: Option<ClassTransformOptions>,
    pub response_model: Option<Arc<dyn ObjectType>>,

    pub is_authorized_used: bool,
    /// Controller roles followed by action roles
    pub authorized_roles: Vec<String>,

    pub is_body_used: bool,
    pub is_file_used: bool,
    pub is_files_used: bool,
    pub body_extra_options: Option<Value>,

    pub(crate) handler: MethodHandler,
    pub append_params: Option<AppendParams>,
    pub method_override: Option<MethodOverride>,
}

impl ActionMetadata {
    pub(crate) fn build(
        controller: &ControllerMetadata,
        declaration: &ActionDeclaration,
        mut params: Vec<ParamMetadata>,
        uses: Vec<UseMetadata>,
        interceptors: Vec<InterceptorMetadata>,
        handlers: &[&ResponseHandlerKind],
        defaults: &RoutingDefaults,
    ) -> Self {
        params.sort_by_key(|param| param.index);

        let content_type = handlers.iter().find_map(|handler| match handler {
            ResponseHandlerKind::ContentType(value) => Some(value.clone()),
            _ => None,
        });
        let is_json_typed = match &content_type {
            Some(value) => value.contains("json"),
            None => controller.is_json(),
        };

        let mut headers = Vec::new();
        let mut success_http_code = None;
        let mut undefined_result = None;
        let mut null_result = None;
        let mut redirect = None;
        let mut rendered_template = None;
        let mut authorized = None;
        let mut response_class_transform = None;
        let mut response_model = None;
        let mut location = None;
        for handler in handlers {
            match handler {
                ResponseHandlerKind::SuccessCode(code) => {
                    success_http_code.get_or_insert(*code);
                }
                ResponseHandlerKind::OnUndefined(on) => {
                    undefined_result.get_or_insert_with(|| on.clone());
                }
                ResponseHandlerKind::OnNull(on) => {
                    null_result.get_or_insert_with(|| on.clone());
                }
                ResponseHandlerKind::Redirect(target) => {
                    redirect.get_or_insert_with(|| target.clone());
                }
                ResponseHandlerKind::Render(template) => {
                    rendered_template.get_or_insert_with(|| template.clone());
                }
                ResponseHandlerKind::Authorized(roles) => {
                    authorized.get_or_insert(roles);
                }
                ResponseHandlerKind::ResponseClassTransform(options) => {
                    response_class_transform.get_or_insert_with(|| options.clone());
                }
                ResponseHandlerKind::ResponseModel(model) => {
                    response_model.get_or_insert_with(|| model.clone());
                }
                ResponseHandlerKind::Location(target) => {
                    location.get_or_insert_with(|| target.clone());
                }
                ResponseHandlerKind::ContentType(_) | ResponseHandlerKind::Header(_, _) => {}
            }
        }

        if let Some(location) = location {
            headers.push(("Location".to_string(), location));
        }
        if let Some(content_type) = content_type {
            headers.push(("Content-Type".to_string(), content_type));
        }
        for handler in handlers {
            if let ResponseHandlerKind::Header(name, value) = handler {
                headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
                headers.push((name.clone(), value.clone()));
            }
        }

        let undefined_result = undefined_result.or_else(|| default_status(defaults.undefined_result_code));
        let null_result = null_result.or_else(|| default_status(defaults.null_result_code));

        let mut authorized_roles = controller.authorized_roles.clone();
        if let Some(roles) = authorized {
            authorized_roles.extend(roles.iter().cloned());
        }

        let body_param = params
            .iter()
            .find(|param| matches!(param.kind, ParamKind::Body | ParamKind::BodyParam));

        Self {
            target: declaration.target,
            method: declaration.method.clone(),
            verb: declaration.verb,
            route: declaration.route.clone(),
            full_route: Route::join(&controller.route, &declaration.route),
            options: controller.options.merged(&declaration.options),
            is_body_used: body_param.is_some(),
            body_extra_options: body_param.and_then(|param| param.extra_options.clone()),
            is_file_used: params.iter().any(|param| param.kind == ParamKind::File),
            is_files_used: params.iter().any(|param| param.kind == ParamKind::Files),
            params,
            uses,
            interceptors,
            is_json_typed,
            success_http_code,
            undefined_result,
            null_result,
            redirect,
            rendered_template,
            headers,
            response_class_transform,
            response_model,
            is_authorized_used: controller.is_authorized_used || authorized.is_some(),
            authorized_roles,
            handler: declaration.handler.clone(),
            append_params: declaration.append_params.clone(),
            method_override: declaration.method_override.clone(),
        }
    }

    /// Call the action method on a controller instance.
    pub async fn call_method(&self, instance: Instance, args: Args) -> Result<Output, HttpError> {
        (self.handler)(instance, args).await
    }

    /// `Controller.method`, for logs and error messages.
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.target.short_name(), self.method)
    }
}

fn default_status(code: Option<u16>) -> Option<OnEmpty> {
    let code = code?;
    match StatusCode::from_u16(code) {
        Ok(status) => Some(OnEmpty::Status(status)),
        Err(_) => {
            tracing::warn!(code, "Ignoring invalid default result code");
            None
        }
    }
}

impl fmt::Debug for ActionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMetadata")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("verb", &self.verb)
            .field("full_route", &self.full_route)
            .field("params", &self.params)
            .field("is_json_typed", &self.is_json_typed)
            .field("is_authorized_used", &self.is_authorized_used)
            .field("authorized_roles", &self.authorized_roles)
            .finish_non_exhaustive()
    }
}
