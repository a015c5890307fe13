//! Authorization and current-user checkers.

use crate::context::RequestContext;
use crate::error::HttpError;
use async_trait::async_trait;
use serde_json::Value;

/// Decides whether a request may run an action requiring `roles`.
#[async_trait]
pub trait AuthorizationChecker: Send + Sync + 'static {
    async fn check(&self, ctx: &RequestContext, roles: &[String]) -> Result<bool, HttpError>;
}

/// Resolves the user making a request.
#[async_trait]
pub trait CurrentUserChecker: Send + Sync + 'static {
    /// `None` when nobody is logged in
    async fn current_user(&self, ctx: &RequestContext) -> Result<Option<Value>, HttpError>;
}

/// Authorization checker from a synchronous closure.
pub struct FnAuthorizationChecker<F> {
    f: F,
}

impl<F> FnAuthorizationChecker<F>
where
    F: Fn(&RequestContext, &[String]) -> bool + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> AuthorizationChecker for FnAuthorizationChecker<F>
where
    F: Fn(&RequestContext, &[String]) -> bool + Send + Sync + 'static,
{
    async fn check(&self, ctx: &RequestContext, roles: &[String]) -> Result<bool, HttpError> {
        Ok((self.f)(ctx, roles))
    }
}

/// Current-user checker from a synchronous closure.
pub struct FnCurrentUserChecker<F> {
    f: F,
}

impl<F> FnCurrentUserChecker<F>
where
    F: Fn(&RequestContext) -> Option<Value> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> CurrentUserChecker for FnCurrentUserChecker<F>
where
    F: Fn(&RequestContext) -> Option<Value> + Send + Sync + 'static,
{
    async fn current_user(&self, ctx: &RequestContext) -> Result<Option<Value>, HttpError> {
        Ok((self.f)(ctx))
    }
}
