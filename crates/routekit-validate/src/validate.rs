//! Validation trait.

use crate::error::ValidationError;

/// Trait for validatable parameter types.
///
/// Wraps `validator::Validate` and reports failures as a [`ValidationError`].
/// Every type deriving `validator::Validate` gets it for free.
///
/// ## Example
///
/// ```rust,ignore
/// use routekit_validate::Validate;
/// use validator::Validate as ValidatorValidate;
///
/// #[derive(ValidatorValidate)]
/// struct CreateUser {
///     #[validate(email)]
///     email: String,
/// }
///
/// let user = CreateUser { email: "nope".into() };
/// assert!(Validate::validate(&user).is_err());
/// ```
pub trait Validate: validator::Validate {
    /// Validate the value and return a `ValidationError` on failure.
    fn validate(&self) -> Result<(), ValidationError> {
        validator::Validate::validate(self).map_err(ValidationError::from_validator_errors)
    }

    /// Validate and return the value if valid, error otherwise.
    fn validated(self) -> Result<Self, ValidationError>
    where
        Self: Sized,
    {
        Validate::validate(&self)?;
        Ok(self)
    }
}

impl<T: validator::Validate> Validate for T {}

#[cfg(test)]
mod tests {
    use super::Validate;

    // Derived in their own module so only `validator::Validate` is in scope
    // for the generated code.
    mod fixtures {
        use validator::Validate;

        #[derive(Debug, Validate)]
        pub struct Address {
            #[validate(length(min = 2))]
            pub city: String,
        }

        #[derive(Debug, Validate)]
        pub struct TestUser {
            #[validate(email)]
            pub email: String,
            #[validate(length(min = 3, max = 20))]
            pub username: String,
            #[validate(range(min = 18, max = 120))]
            pub age: u8,
            #[validate(nested)]
            pub address: Address,
        }
    }

    use fixtures::{Address, TestUser};

    fn user() -> TestUser {
        TestUser {
            email: "test@example.com".to_string(),
            username: "testuser".to_string(),
            age: 25,
            address: Address {
                city: "Dushanbe".to_string(),
            },
        }
    }

    #[test]
    fn valid_struct_passes() {
        assert!(Validate::validate(&user()).is_ok());
    }

    #[test]
    fn invalid_email_fails() {
        let mut user = user();
        user.email = "not-an-email".to_string();

        let error = Validate::validate(&user).unwrap_err();
        assert!(error.fields.iter().any(|f| f.field == "email"));
    }

    #[test]
    fn invalid_length_fails() {
        let mut user = user();
        user.username = "ab".to_string();

        let error = Validate::validate(&user).unwrap_err();
        assert!(error
            .fields
            .iter()
            .any(|f| f.field == "username" && f.code == "length"));
    }

    #[test]
    fn nested_errors_use_dotted_paths() {
        let mut user = user();
        user.address.city = "x".to_string();

        let error = Validate::validate(&user).unwrap_err();
        assert!(error.fields.iter().any(|f| f.field == "address.city"));
    }

    #[test]
    fn multiple_errors_collected_in_stable_order() {
        let mut user = user();
        user.email = "invalid".to_string();
        user.username = "ab".to_string();
        user.age = 150;

        let error = Validate::validate(&user).unwrap_err();
        let fields: Vec<_> = error.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["age", "email", "username"]);
    }

    #[test]
    fn validated_returns_value_on_success() {
        let validated = user().validated().unwrap();
        assert_eq!(validated.email, "test@example.com");
    }
}
