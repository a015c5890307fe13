//! Metadata store.
//!
//! Registration calls deposit raw [`Declaration`] records here. Nothing is
//! validated or cross-linked at this point; the
//! [`MetadataBuilder`](crate::builder::MetadataBuilder) does that when the
//! routes are registered.
//!
//! A process-wide store is available through [`global_store`]. Tests and
//! multi-tenant setups construct their own [`MetadataStore`] instead, or call
//! [`MetadataStore::reset`] between runs.

use crate::class::ClassRef;
use crate::handler::{AppendParams, MethodHandler, MethodOverride, ParamTransform};
use crate::interceptor::{Interceptor, InterceptorHandle};
use crate::metadata::{ControllerKind, ControllerOptions, MiddlewarePhase, ParamKind, ResponseHandlerKind};
use crate::middleware::{Middleware, MiddlewareHandle};
use crate::route::{Route, Verb};
use crate::transform::{ClassTransformOptions, TargetType};
use serde_json::Value;
use std::sync::{Arc, OnceLock, RwLock};

/// A controller declaration.
#[derive(Debug, Clone)]
pub struct ControllerDeclaration {
    pub target: ClassRef,
    pub route: Route,
    pub kind: ControllerKind,
    pub options: ControllerOptions,
}

impl ControllerDeclaration {
    /// A controller whose results are emitted by shape.
    pub fn new<C: 'static>(route: impl Into<Route>) -> Self {
        Self {
            target: ClassRef::of::<C>(),
            route: route.into(),
            kind: ControllerKind::Default,
            options: ControllerOptions::default(),
        }
    }

    /// A controller whose results are always JSON.
    pub fn json<C: 'static>(route: impl Into<Route>) -> Self {
        Self {
            kind: ControllerKind::Json,
            ..Self::new::<C>(route)
        }
    }

    pub fn transform_request(mut self, enabled: bool) -> Self {
        self.options.transform_request = Some(enabled);
        self
    }

    pub fn transform_response(mut self, enabled: bool) -> Self {
        self.options.transform_response = Some(enabled);
        self
    }
}

/// An action declaration: one method bound to a verb and route.
#[derive(Clone)]
pub struct ActionDeclaration {
    pub target: ClassRef,
    pub method: String,
    pub verb: Verb,
    pub route: Route,
    pub options: ControllerOptions,
    pub handler: MethodHandler,
    pub append_params: Option<AppendParams>,
    pub method_override: Option<MethodOverride>,
}

impl ActionDeclaration {
    pub fn new<C: 'static>(
        verb: Verb,
        route: impl Into<Route>,
        method: impl Into<String>,
        handler: MethodHandler,
    ) -> Self {
        Self {
            target: ClassRef::of::<C>(),
            method: method.into(),
            verb,
            route: route.into(),
            options: ControllerOptions::default(),
            handler,
            append_params: None,
            method_override: None,
        }
    }

    pub fn get<C: 'static>(route: impl Into<Route>, method: impl Into<String>, handler: MethodHandler) -> Self {
        Self::new::<C>(Verb::Get, route, method, handler)
    }

    pub fn post<C: 'static>(route: impl Into<Route>, method: impl Into<String>, handler: MethodHandler) -> Self {
        Self::new::<C>(Verb::Post, route, method, handler)
    }

    pub fn put<C: 'static>(route: impl Into<Route>, method: impl Into<String>, handler: MethodHandler) -> Self {
        Self::new::<C>(Verb::Put, route, method, handler)
    }

    pub fn patch<C: 'static>(route: impl Into<Route>, method: impl Into<String>, handler: MethodHandler) -> Self {
        Self::new::<C>(Verb::Patch, route, method, handler)
    }

    pub fn delete<C: 'static>(route: impl Into<Route>, method: impl Into<String>, handler: MethodHandler) -> Self {
        Self::new::<C>(Verb::Delete, route, method, handler)
    }

    pub fn head<C: 'static>(route: impl Into<Route>, method: impl Into<String>, handler: MethodHandler) -> Self {
        Self::new::<C>(Verb::Head, route, method, handler)
    }

    pub fn all<C: 'static>(route: impl Into<Route>, method: impl Into<String>, handler: MethodHandler) -> Self {
        Self::new::<C>(Verb::All, route, method, handler)
    }

    pub fn transform_request(mut self, enabled: bool) -> Self {
        self.options.transform_request = Some(enabled);
        self
    }

    pub fn transform_response(mut self, enabled: bool) -> Self {
        self.options.transform_response = Some(enabled);
        self
    }

    pub fn append_params(mut self, hook: AppendParams) -> Self {
        self.append_params = Some(hook);
        self
    }

    pub fn method_override(mut self, hook: MethodOverride) -> Self {
        self.method_override = Some(hook);
        self
    }
}

impl std::fmt::Debug for ActionDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDeclaration")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("verb", &self.verb)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// A parameter declaration.
///
/// `required` left unset falls back to the global parameter defaults.
#[derive(Clone)]
pub struct ParamDeclaration {
    pub target: ClassRef,
    pub method: String,
    pub index: usize,
    pub kind: ParamKind,
    pub name: Option<String>,
    pub required: Option<bool>,
    pub parse: bool,
    pub is_array: bool,
    pub target_type: Option<TargetType>,
    pub transform: Option<ParamTransform>,
    pub validate: Option<bool>,
    pub class_transform: Option<ClassTransformOptions>,
    pub extra_options: Option<Value>,
}

impl ParamDeclaration {
    pub fn new<C: 'static>(method: impl Into<String>, index: usize, kind: ParamKind, name: Option<String>) -> Self {
        Self {
            target: ClassRef::of::<C>(),
            method: method.into(),
            index,
            kind,
            name,
            required: None,
            parse: false,
            is_array: false,
            target_type: None,
            transform: None,
            validate: None,
            class_transform: None,
            extra_options: None,
        }
    }

    /// The whole request body.
    pub fn body<C: 'static>(method: impl Into<String>, index: usize) -> Self {
        Self::new::<C>(method, index, ParamKind::Body, None)
    }

    /// One property of the request body.
    pub fn body_param<C: 'static>(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self::new::<C>(method, index, ParamKind::BodyParam, Some(name.into()))
    }

    /// A route parameter. Required unless stated otherwise.
    pub fn param<C: 'static>(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self::new::<C>(method, index, ParamKind::Param, Some(name.into())).required(true)
    }

    /// All route parameters.
    pub fn params<C: 'static>(method: impl Into<String>, index: usize) -> Self {
        Self::new::<C>(method, index, ParamKind::Params, None)
    }

    pub fn query<C: 'static>(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self::new::<C>(method, index, ParamKind::Query, Some(name.into()))
    }

    pub fn queries<C: 'static>(method: impl Into<String>, index: usize) -> Self {
        Self::new::<C>(method, index, ParamKind::Queries, None)
    }

    pub fn header<C: 'static>(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self::new::<C>(method, index, ParamKind::Header, Some(name.into()))
    }

    pub fn headers<C: 'static>(method: impl Into<String>, index: usize) -> Self {
        Self::new::<C>(method, index, ParamKind::Headers, None)
    }

    pub fn cookie<C: 'static>(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self::new::<C>(method, index, ParamKind::Cookie, Some(name.into()))
    }

    pub fn cookies<C: 'static>(method: impl Into<String>, index: usize) -> Self {
        Self::new::<C>(method, index, ParamKind::Cookies, None)
    }

    /// The whole session. Required unless stated otherwise.
    pub fn session<C: 'static>(method: impl Into<String>, index: usize) -> Self {
        Self::new::<C>(method, index, ParamKind::Session, None).required(true)
    }

    pub fn session_param<C: 'static>(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self::new::<C>(method, index, ParamKind::SessionParam, Some(name.into()))
    }

    /// One uploaded file of a multipart request.
    pub fn file<C: 'static>(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self::new::<C>(method, index, ParamKind::File, Some(name.into()))
    }

    /// All files uploaded under one multipart field.
    pub fn files<C: 'static>(method: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self::new::<C>(method, index, ParamKind::Files, Some(name.into()))
    }

    /// A value from the request state bag, or the whole bag when `name` is `None`.
    pub fn state<C: 'static>(method: impl Into<String>, index: usize, name: Option<&str>) -> Self {
        Self::new::<C>(method, index, ParamKind::State, name.map(str::to_string))
    }

    /// The user resolved by the current-user checker.
    pub fn current_user<C: 'static>(method: impl Into<String>, index: usize) -> Self {
        Self::new::<C>(method, index, ParamKind::CurrentUser, None)
    }

    /// A value produced entirely by `transform`.
    pub fn custom<C: 'static>(method: impl Into<String>, index: usize, transform: ParamTransform) -> Self {
        Self::new::<C>(method, index, ParamKind::Custom, None).transform(transform)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Parse textual values as JSON.
    pub fn parse(mut self) -> Self {
        self.parse = true;
        self
    }

    /// Always pass an array.
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn typed(mut self, target_type: TargetType) -> Self {
        self.target_type = Some(target_type);
        self
    }

    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate = Some(enabled);
        self
    }

    pub fn class_transform(mut self, options: ClassTransformOptions) -> Self {
        self.class_transform = Some(options);
        self
    }

    pub fn transform(mut self, transform: ParamTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn extra(mut self, options: Value) -> Self {
        self.extra_options = Some(options);
        self
    }
}

impl std::fmt::Debug for ParamDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamDeclaration")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A middleware class declaration.
#[derive(Debug, Clone)]
pub struct MiddlewareDeclaration {
    pub target: ClassRef,
    pub handle: MiddlewareHandle,
    pub global: bool,
    pub phase: MiddlewarePhase,
    pub priority: i32,
}

impl MiddlewareDeclaration {
    /// A middleware resolved through the container.
    pub fn of<T: Middleware>(phase: MiddlewarePhase) -> Self {
        Self {
            target: ClassRef::of::<T>(),
            handle: MiddlewareHandle::of::<T>(),
            global: false,
            phase,
            priority: 0,
        }
    }

    /// A ready middleware instance.
    pub fn instance<T: Middleware>(phase: MiddlewarePhase, middleware: T) -> Self {
        Self {
            target: ClassRef::of::<T>(),
            handle: MiddlewareHandle::instance(middleware),
            global: false,
            phase,
            priority: 0,
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// An interceptor class declaration.
#[derive(Debug, Clone)]
pub struct InterceptorDeclaration {
    pub target: ClassRef,
    pub handle: InterceptorHandle,
    pub global: bool,
    pub priority: i32,
}

impl InterceptorDeclaration {
    pub fn of<T: Interceptor>() -> Self {
        Self {
            target: ClassRef::of::<T>(),
            handle: InterceptorHandle::of::<T>(),
            global: false,
            priority: 0,
        }
    }

    pub fn instance<T: Interceptor>(interceptor: T) -> Self {
        Self {
            target: ClassRef::of::<T>(),
            handle: InterceptorHandle::instance(interceptor),
            global: false,
            priority: 0,
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// What a "use" declaration attaches.
#[derive(Debug, Clone)]
pub enum UseKind {
    Middleware { handle: MiddlewareHandle, after: bool },
    Interceptor(InterceptorHandle),
}

/// A middleware or interceptor attached to a controller (`method` unset) or
/// a single action.
#[derive(Debug, Clone)]
pub struct UseDeclaration {
    pub target: ClassRef,
    pub method: Option<String>,
    pub kind: UseKind,
}

impl UseDeclaration {
    pub fn middleware<C: 'static>(method: Option<&str>, handle: MiddlewareHandle) -> Self {
        Self::new::<C>(method, UseKind::Middleware { handle, after: false })
    }

    pub fn after_middleware<C: 'static>(method: Option<&str>, handle: MiddlewareHandle) -> Self {
        Self::new::<C>(method, UseKind::Middleware { handle, after: true })
    }

    pub fn interceptor<C: 'static>(method: Option<&str>, handle: InterceptorHandle) -> Self {
        Self::new::<C>(method, UseKind::Interceptor(handle))
    }

    fn new<C: 'static>(method: Option<&str>, kind: UseKind) -> Self {
        Self {
            target: ClassRef::of::<C>(),
            method: method.map(str::to_string),
            kind,
        }
    }
}

/// A response-shaping declaration on a controller (`method` unset) or action.
#[derive(Debug, Clone)]
pub struct ResponseHandlerDeclaration {
    pub target: ClassRef,
    pub method: Option<String>,
    pub kind: ResponseHandlerKind,
}

impl ResponseHandlerDeclaration {
    pub fn action<C: 'static>(method: impl Into<String>, kind: ResponseHandlerKind) -> Self {
        Self {
            target: ClassRef::of::<C>(),
            method: Some(method.into()),
            kind,
        }
    }

    pub fn controller<C: 'static>(kind: ResponseHandlerKind) -> Self {
        Self {
            target: ClassRef::of::<C>(),
            method: None,
            kind,
        }
    }
}

/// Any raw declaration.
#[derive(Debug, Clone)]
pub enum Declaration {
    Controller(ControllerDeclaration),
    Action(ActionDeclaration),
    Param(ParamDeclaration),
    Middleware(MiddlewareDeclaration),
    Interceptor(InterceptorDeclaration),
    Use(UseDeclaration),
    ResponseHandler(ResponseHandlerDeclaration),
}

macro_rules! impl_from_declaration {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Declaration {
                fn from(declaration: $ty) -> Self {
                    Declaration::$variant(declaration)
                }
            }
        )*
    };
}

impl_from_declaration! {
    Controller => ControllerDeclaration,
    Action => ActionDeclaration,
    Param => ParamDeclaration,
    Middleware => MiddlewareDeclaration,
    Interceptor => InterceptorDeclaration,
    Use => UseDeclaration,
    ResponseHandler => ResponseHandlerDeclaration,
}

/// All stored declarations, grouped by kind in registration order.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub controllers: Vec<ControllerDeclaration>,
    pub actions: Vec<ActionDeclaration>,
    pub params: Vec<ParamDeclaration>,
    pub middlewares: Vec<MiddlewareDeclaration>,
    pub interceptors: Vec<InterceptorDeclaration>,
    pub uses: Vec<UseDeclaration>,
    pub response_handlers: Vec<ResponseHandlerDeclaration>,
}

impl Declarations {
    pub fn len(&self) -> usize {
        self.controllers.len()
            + self.actions.len()
            + self.params.len()
            + self.middlewares.len()
            + self.interceptors.len()
            + self.uses.len()
            + self.response_handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, declaration: Declaration) {
        match declaration {
            Declaration::Controller(d) => self.controllers.push(d),
            Declaration::Action(d) => self.actions.push(d),
            Declaration::Param(d) => self.params.push(d),
            Declaration::Middleware(d) => self.middlewares.push(d),
            Declaration::Interceptor(d) => self.interceptors.push(d),
            Declaration::Use(d) => self.uses.push(d),
            Declaration::ResponseHandler(d) => self.response_handlers.push(d),
        }
    }
}

/// Append-only table of raw declarations.
#[derive(Debug, Default)]
pub struct MetadataStore {
    declarations: RwLock<Declarations>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one declaration.
    pub fn register(&self, declaration: impl Into<Declaration>) -> &Self {
        let declaration = declaration.into();
        self.write().push(declaration);
        self
    }

    /// Store several declarations in order.
    pub fn register_all<I>(&self, declarations: I) -> &Self
    where
        I: IntoIterator,
        I::Item: Into<Declaration>,
    {
        let mut guard = self.write();
        for declaration in declarations {
            guard.push(declaration.into());
        }
        drop(guard);
        self
    }

    /// Drop every declaration.
    pub fn reset(&self) {
        *self.write() = Declarations::default();
    }

    /// Copy of the current declarations.
    pub fn snapshot(&self) -> Declarations {
        self.declarations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.declarations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Declarations> {
        // Declarations are plain pushes, so a poisoned lock still holds consistent data
        self.declarations.write().unwrap_or_else(|e| e.into_inner())
    }
}

static GLOBAL_STORE: OnceLock<Arc<MetadataStore>> = OnceLock::new();

/// The process-wide store, created on first access.
pub fn global_store() -> Arc<MetadataStore> {
    GLOBAL_STORE
        .get_or_init(|| Arc::new(MetadataStore::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::handler::method;
    use crate::value::Args;

    struct Posts;

    fn list() -> MethodHandler {
        method(|_: Arc<Posts>, _args: Args| async move { Ok::<_, HttpError>(()) })
    }

    #[test]
    fn declarations_are_grouped_in_order() {
        let store = MetadataStore::new();
        store
            .register(ControllerDeclaration::json::<Posts>("/posts"))
            .register(ActionDeclaration::get::<Posts>("/", "list", list()))
            .register(ParamDeclaration::query::<Posts>("list", 1, "page"))
            .register(ParamDeclaration::query::<Posts>("list", 0, "limit"));

        let declarations = store.snapshot();
        assert_eq!(declarations.len(), 4);
        assert_eq!(declarations.params[0].name.as_deref(), Some("page"));
        assert_eq!(declarations.controllers[0].kind, ControllerKind::Json);
    }

    #[test]
    fn register_all_keeps_iteration_order() {
        let store = MetadataStore::new();
        store.register_all(vec![
            ParamDeclaration::query::<Posts>("list", 0, "limit"),
            ParamDeclaration::query::<Posts>("list", 1, "page"),
        ]);

        let declarations = store.snapshot();
        let names: Vec<_> = declarations.params.iter().filter_map(|p| p.name.as_deref()).collect();
        assert_eq!(names, vec!["limit", "page"]);
    }

    #[test]
    fn param_defaults_follow_their_kind() {
        assert_eq!(ParamDeclaration::param::<Posts>("get", 0, "id").required, Some(true));
        assert_eq!(ParamDeclaration::session::<Posts>("get", 0).required, Some(true));
        assert_eq!(ParamDeclaration::query::<Posts>("get", 0, "q").required, None);
        assert_eq!(ParamDeclaration::body::<Posts>("get", 0).required, None);
    }

    #[test]
    fn reset_clears_everything() {
        let store = MetadataStore::new();
        store.register(ControllerDeclaration::new::<Posts>("/posts"));
        assert!(!store.is_empty());
        store.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn global_store_is_shared() {
        let a = global_store();
        let b = global_store();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
