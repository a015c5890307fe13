//! Compiled metadata graph.
//!
//! Built once by the [`MetadataBuilder`](crate::builder::MetadataBuilder)
//! from the raw declarations in the store, read-only afterwards. Ownership is
//! top-down: a controller owns its actions, an action owns its parameters.
//! Code that needs the owning controller of an action receives it explicitly.

mod action;
mod controller;
mod middleware;
mod param;
mod response;

pub use action::ActionMetadata;
pub use controller::{ControllerKind, ControllerMetadata, ControllerOptions};
pub use middleware::{InterceptorMetadata, MiddlewareMetadata, MiddlewarePhase, UseMetadata};
pub use param::{ParamKind, ParamMetadata};
pub use response::{OnEmpty, ResponseHandlerKind};
