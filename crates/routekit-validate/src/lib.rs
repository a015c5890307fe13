//! # RouteKit Validation
//!
//! Validation support for controller action parameters. Parameter types
//! derive `validator::Validate`; the execution engine runs validation after
//! the plain value has been converted into the declared target type and turns
//! failures into a structured error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use routekit_validate::prelude::*;
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreateUser {
//!     #[validate(email)]
//!     email: String,
//!
//!     #[validate(length(min = 3, max = 50))]
//!     username: String,
//! }
//! ```
//!
//! ## Error Format
//!
//! ```json
//! {
//!   "error": {
//!     "type": "validation_error",
//!     "message": "Validation failed",
//!     "target": "user",
//!     "fields": [
//!       {"field": "email", "code": "email", "message": "Validation failed for field 'email'"}
//!     ]
//!   }
//! }
//! ```

mod error;
mod validate;

pub use error::{FieldError, ValidationError};
pub use validate::Validate;

pub use validator::Validate as ValidatorValidate;

/// Prelude module for validation
pub mod prelude {
    pub use crate::error::{FieldError, ValidationError};
    pub use crate::validate::Validate;
    pub use validator::Validate as ValidatorValidate;
}
