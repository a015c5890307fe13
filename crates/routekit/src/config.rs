//! Routing options.
//!
//! [`RoutingOptions`] carries everything bootstrap needs. The serializable
//! part, [`RoutingConfig`], can be loaded from `ROUTEKIT_*` environment
//! variables (after a `.env` file is loaded); checkers, the container and the
//! class lists are set in code.
//!
//! ```ignore
//! // ROUTEKIT_ROUTE_PREFIX=/api ROUTEKIT_NULL_RESULT_CODE=404
//! let options = RoutingOptions::from_env()?
//!     .controllers(vec![ClassRef::of::<UserController>()])
//!     .authorization_checker(FnAuthorizationChecker::new(|ctx, _| ctx.header("authorization").is_some()));
//! ```

use routekit_core::{
    AuthorizationChecker, ClassRef, ClassTransformOptions, Container, CurrentUserChecker, DriverSettings,
    MetadataStore, ParamOptions, RoutingDefaults,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Prefix of the environment variables read by [`RoutingOptions::from_env`].
pub const ENV_PREFIX: &str = "ROUTEKIT_";

/// Error type for configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    /// Environment variable deserialization failed.
    EnvyError(envy::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvyError(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::EnvyError(e) => Some(e),
        }
    }
}

impl From<envy::Error> for ConfigError {
    fn from(err: envy::Error) -> Self {
        ConfigError::EnvyError(err)
    }
}

/// Environment profile, detected from `ROUTEKIT_ENV`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Custom(String),
}

impl Environment {
    /// `Production` for "production"/"prod", `Development` for
    /// "development"/"dev" or when unset, `Custom` otherwise.
    pub fn current() -> Self {
        Self::parse(std::env::var("ROUTEKIT_ENV").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("production") | Some("prod") => Self::Production,
            Some("development") | Some("dev") | None => Self::Development,
            Some(other) => Self::Custom(other.to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings that can come from the environment.
///
/// Field names map to `ROUTEKIT_` + SCREAMING_SNAKE_CASE, e.g.
/// `route_prefix` reads `ROUTEKIT_ROUTE_PREFIX`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Expose internal error details; unset follows [`Environment`]
    pub development: Option<bool>,
    pub default_error_handler: bool,
    pub class_transformer: bool,
    pub validation: bool,
    pub route_prefix: String,
    /// Status for actions returning null without their own declaration
    pub null_result_code: Option<u16>,
    /// Status for actions returning nothing without their own declaration
    pub undefined_result_code: Option<u16>,
    /// Whether parameters are required when their declaration leaves it unset
    pub params_required: Option<bool>,
    /// Maximum request body size for the hyper driver
    pub body_limit: Option<usize>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            development: None,
            default_error_handler: true,
            class_transformer: true,
            validation: true,
            route_prefix: String::new(),
            null_result_code: None,
            undefined_result_code: None,
            params_required: None,
            body_limit: None,
        }
    }
}

impl RoutingConfig {
    /// Read `ROUTEKIT_*` variables, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }

    pub fn is_development(&self) -> bool {
        self.development
            .unwrap_or_else(|| Environment::current().is_development())
    }

    pub fn defaults(&self) -> RoutingDefaults {
        RoutingDefaults {
            null_result_code: self.null_result_code,
            undefined_result_code: self.undefined_result_code,
            param_options: ParamOptions {
                required: self.params_required,
            },
        }
    }
}

/// Everything bootstrap needs.
#[derive(Clone, Default)]
pub struct RoutingOptions {
    pub config: RoutingConfig,
    /// Controllers to register; `None` registers every declared controller
    pub controllers: Option<Vec<ClassRef>>,
    /// Middlewares to register; `None` registers every declared global middleware
    pub middlewares: Option<Vec<ClassRef>>,
    /// Interceptors to register; `None` registers every declared global interceptor
    pub interceptors: Option<Vec<ClassRef>>,
    pub plain_to_class_options: ClassTransformOptions,
    pub class_to_plain_options: ClassTransformOptions,
    pub authorization_checker: Option<Arc<dyn AuthorizationChecker>>,
    pub current_user_checker: Option<Arc<dyn CurrentUserChecker>>,
    pub container: Option<Arc<dyn Container>>,
    /// Declarations to build from; `None` uses the process-wide store
    pub store: Option<Arc<MetadataStore>>,
}

impl RoutingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options whose [`RoutingConfig`] is read from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            config: RoutingConfig::from_env()?,
            ..Self::default()
        })
    }

    pub fn with_config(mut self, config: RoutingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.route_prefix = prefix.into();
        self
    }

    pub fn development(mut self, development: bool) -> Self {
        self.config.development = Some(development);
        self
    }

    pub fn controllers(mut self, classes: Vec<ClassRef>) -> Self {
        self.controllers = Some(classes);
        self
    }

    pub fn middlewares(mut self, classes: Vec<ClassRef>) -> Self {
        self.middlewares = Some(classes);
        self
    }

    pub fn interceptors(mut self, classes: Vec<ClassRef>) -> Self {
        self.interceptors = Some(classes);
        self
    }

    pub fn authorization_checker<C: AuthorizationChecker>(mut self, checker: C) -> Self {
        self.authorization_checker = Some(Arc::new(checker));
        self
    }

    pub fn current_user_checker<C: CurrentUserChecker>(mut self, checker: C) -> Self {
        self.current_user_checker = Some(Arc::new(checker));
        self
    }

    pub fn container<C: Container + 'static>(mut self, container: C) -> Self {
        self.container = Some(Arc::new(container));
        self
    }

    pub fn store(mut self, store: Arc<MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Copy the driver-level settings onto an adapter's settings.
    pub fn apply(&self, settings: &mut DriverSettings) {
        settings.development = self.config.is_development();
        settings.default_error_handler = self.config.default_error_handler;
        settings.class_transformer = self.config.class_transformer;
        settings.validation = self.config.validation;
        settings.route_prefix = self.config.route_prefix.clone();
        settings.plain_to_class_options = self.plain_to_class_options.clone();
        settings.class_to_plain_options = self.class_to_plain_options.clone();
        if let Some(checker) = &self.authorization_checker {
            settings.authorization_checker = Some(checker.clone());
        }
        if let Some(checker) = &self.current_user_checker {
            settings.current_user_checker = Some(checker.clone());
        }
        if let Some(container) = &self.container {
            settings.container = container.clone();
        }
    }
}

impl fmt::Debug for RoutingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingOptions")
            .field("config", &self.config)
            .field("controllers", &self.controllers)
            .field("middlewares", &self.middlewares)
            .field("interceptors", &self.interceptors)
            .field("authorization_checker", &self.authorization_checker.is_some())
            .field("current_user_checker", &self.current_user_checker.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_names() {
        assert_eq!(Environment::parse(None), Environment::Development);
        assert_eq!(Environment::parse(Some("prod")), Environment::Production);
        assert_eq!(Environment::parse(Some("production")), Environment::Production);
        assert_eq!(Environment::parse(Some("staging")), Environment::Custom("staging".into()));
        assert_eq!(Environment::parse(Some("staging")).to_string(), "staging");
    }

    #[test]
    fn config_reads_prefixed_variables() {
        let vars = vec![
            ("ROUTEKIT_ROUTE_PREFIX".to_string(), "/api".to_string()),
            ("ROUTEKIT_NULL_RESULT_CODE".to_string(), "404".to_string()),
            ("ROUTEKIT_VALIDATION".to_string(), "false".to_string()),
            ("ROUTEKIT_DEVELOPMENT".to_string(), "true".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let config: RoutingConfig = envy::prefixed(ENV_PREFIX).from_iter(vars).unwrap();

        assert_eq!(config.route_prefix, "/api");
        assert_eq!(config.null_result_code, Some(404));
        assert!(!config.validation);
        assert!(config.class_transformer);
        assert!(config.is_development());
        assert_eq!(config.defaults().null_result_code, Some(404));
        assert_eq!(config.defaults().param_options.required, None);
    }

    #[test]
    fn options_apply_to_driver_settings() {
        let options = RoutingOptions::new()
            .route_prefix("/v1")
            .development(false)
            .with_config(RoutingConfig {
                default_error_handler: false,
                route_prefix: "/v2".into(),
                ..RoutingConfig::default()
            });
        let mut settings = DriverSettings::default();
        options.apply(&mut settings);

        assert_eq!(settings.route_prefix, "/v2");
        assert!(!settings.default_error_handler);
        assert!(settings.validation);
        assert!(settings.authorization_checker.is_none());
    }
}
