//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `RAPPORT` prefix and
//! nested values are separated by double underscores. Every section has
//! defaults, so an empty environment yields a runnable (mock) setup once
//! `ai.provider` is set to `mock`.
//!
//! # Example
//!
//! ```no_run
//! use rapport::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod automation;
mod categories;
mod database;
mod error;
mod humanizer;
mod logging;

pub use ai::{AiConfig, AiProvider};
pub use automation::AutomationConfig;
pub use categories::CategoriesConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use humanizer::HumanizerConfig;
pub use logging::{LogFormat, LoggingConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Completion service (OpenAI or mock)
    #[serde(default)]
    pub ai: AiConfig,

    /// Optional reply rewrite service
    #[serde(default)]
    pub humanizer: HumanizerConfig,

    /// Reply loop tuning
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Category registry source
    #[serde(default)]
    pub categories: CategoriesConfig,

    /// PostgreSQL; in-memory storage when no URL is set
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `RAPPORT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `RAPPORT__AI__PROVIDER=mock` -> `ai.provider = mock`
    /// - `RAPPORT__AUTOMATION__POLL_INTERVAL_SECS=10` -> `automation.poll_interval_secs = 10`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("RAPPORT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ai.validate()?;
        self.humanizer.validate()?;
        self.automation.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "RAPPORT__AI__PROVIDER",
        "RAPPORT__AI__OPENAI_API_KEY",
        "RAPPORT__AUTOMATION__POLL_INTERVAL_SECS",
        "RAPPORT__AUTOMATION__SUSPEND_THRESHOLD",
        "RAPPORT__DATABASE__URL",
        "RAPPORT__LOGGING__FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("RAPPORT__AI__PROVIDER", "mock");
        env::set_var("RAPPORT__AUTOMATION__POLL_INTERVAL_SECS", "5");
        env::set_var("RAPPORT__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("RAPPORT__LOGGING__FORMAT", "json");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.ai.provider, AiProvider::Mock);
        assert_eq!(config.automation.poll_interval_secs, 5);
        assert_eq!(config.automation.token_budget, 8000);
        assert_eq!(config.database.url(), Some("postgresql://test@localhost/test"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.ai.provider, AiProvider::OpenAI);
        assert_eq!(config.database.url(), None);
        assert!(!config.humanizer.enabled);
        // OpenAI without a key is not runnable.
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_threshold_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("RAPPORT__AI__PROVIDER", "mock");
        env::set_var("RAPPORT__AUTOMATION__SUSPEND_THRESHOLD", "0.5");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.validate(), Err(ValidationError::InvalidThresholds));
    }
}
