//! Class references and instances.
//!
//! Declarations are keyed by the Rust type that owns them. A [`ClassRef`] is the
//! identity of such a type; an [`Instance`] is a type-erased object handed out
//! by the container.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type-erased controller, middleware or interceptor object.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Identity of a declared type.
#[derive(Clone, Copy)]
pub struct ClassRef {
    id: TypeId,
    name: &'static str,
}

impl ClassRef {
    /// Reference the type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod users {
        pub struct UserController;
    }

    struct Other;

    #[test]
    fn identity_follows_type() {
        assert_eq!(
            ClassRef::of::<users::UserController>(),
            ClassRef::of::<users::UserController>()
        );
        assert_ne!(ClassRef::of::<users::UserController>(), ClassRef::of::<Other>());
    }

    #[test]
    fn short_name_strips_module_path() {
        assert_eq!(
            ClassRef::of::<users::UserController>().short_name(),
            "UserController"
        );
        assert_eq!(ClassRef::of::<Vec<Other>>().short_name(), "Vec");
    }
}
