//! Client configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `MARKET_CHAT` prefix and
//! nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use market_chat::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Backend at {}", config.api.base_url);
//! ```

mod api;
mod error;
mod logging;
mod session;

pub use api::ApiConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use session::SessionConfig;

use serde::Deserialize;

/// Root client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Backend endpoints and timeouts
    #[serde(default)]
    pub api: ApiConfig,

    /// Local user and credential
    pub session: SessionConfig,

    /// Log filter and format
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `MARKET_CHAT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `MARKET_CHAT__API__BASE_URL=https://...` -> `api.base_url`
    /// - `MARKET_CHAT__SESSION__USER_ID=...` -> `session.user_id`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MARKET_CHAT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.api.validate()?;
        self.session.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use std::time::Duration;

    // Tests touching process environment must not interleave
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("MARKET_CHAT__SESSION__USER_ID", "buyer-1");
    }

    fn clear_env() {
        env::remove_var("MARKET_CHAT__SESSION__USER_ID");
        env::remove_var("MARKET_CHAT__SESSION__TOKEN");
        env::remove_var("MARKET_CHAT__API__BASE_URL");
        env::remove_var("MARKET_CHAT__API__REQUEST_TIMEOUT_SECS");
        env::remove_var("MARKET_CHAT__LOGGING__LEVEL");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env();

        let config = AppConfig::load().expect("Failed to load config");
        assert_eq!(config.session.user_id, "buyer-1");
        assert!(config.session.token.is_none());
        assert_eq!(config.api.base_url, "http://localhost:5000");

        clear_env();
    }

    #[test]
    fn test_missing_user_id_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        assert!(matches!(AppConfig::load(), Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_overrides_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env();
        env::set_var("MARKET_CHAT__SESSION__TOKEN", "jwt-value");
        env::set_var("MARKET_CHAT__API__BASE_URL", "https://market.example.com");
        env::set_var("MARKET_CHAT__API__REQUEST_TIMEOUT_SECS", "15");

        let config = AppConfig::load().expect("Failed to load config");
        assert_eq!(config.api.base_url, "https://market.example.com");
        assert_eq!(config.api.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.session.auth_token().unwrap().expose(), "jwt-value");
        assert!(config.validate().is_ok());

        clear_env();
    }

    #[test]
    fn test_validate_rejects_bad_log_filter() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env();
        env::set_var("MARKET_CHAT__LOGGING__LEVEL", "market_chat=loud");

        let config = AppConfig::load().expect("Failed to load config");
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidLogFilter(_))
        ));

        clear_env();
    }
}
