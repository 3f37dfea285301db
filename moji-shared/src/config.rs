/// Configuration management
///
/// Settings are layered with the `config` crate, lowest precedence first:
///
/// 1. Built-in defaults
/// 2. `DATABASE_URL`, as a fallback for `database.url`
/// 3. `MOJI__*` environment variables, with `__` separating nesting levels
///
/// A `.env` file in the working directory is loaded first (for development).
///
/// # Environment Variables
///
/// - `MOJI__DATABASE__URL`: PostgreSQL connection string
/// - `MOJI__DATABASE__MAX_CONNECTIONS`: Pool size (default: 10)
/// - `MOJI__RETRY__MAX_ATTEMPTS`: Attempts per commit (default: 2)
/// - `MOJI__RETRY__BACKOFF_MS`: Pause between attempts (default: 25)
/// - `MOJI__LIMITS__WORKSPACES` / `TASKS` / `NOTES` / `PAGES`: Capacity caps
/// - `MOJI__CAPACITY_MODE`: `soft` or `strict` (default: soft)
/// - `MOJI__DEBUG`: Include storage fault causes in messages (default: false)
///
/// # Example
///
/// ```no_run
/// use moji_shared::config::Settings;
///
/// # fn example() -> Result<(), config::ConfigError> {
/// let settings = Settings::from_env()?;
/// println!("Task cap: {}", settings.limits.tasks);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use config::{Config, ConfigError, Environment};

use crate::db::pool::DatabaseConfig;
use crate::quota::{CapacityLimits, CapacityMode};
use crate::store::RetryPolicy;

/// Environment variable prefix
const ENV_PREFIX: &str = "MOJI";

/// Nesting separator in variable names
const ENV_SEPARATOR: &str = "__";

/// Commit retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per commit, the first one included
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        RetrySettings {
            max_attempts: policy.max_attempts,
            backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

/// Complete data layer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub retry: RetrySettings,
    pub limits: CapacityLimits,
    pub capacity_mode: CapacityMode,

    /// Expose storage fault causes in user-facing messages
    pub debug: bool,
}

impl Settings {
    /// Loads settings from `.env` and the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has a value of the wrong type (for
    /// example a non-numeric `MOJI__LIMITS__TASKS`).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::load(
            std::env::var("DATABASE_URL").ok(),
            Environment::with_prefix(ENV_PREFIX),
        )
    }

    /// Loads settings from an explicit variable map instead of the process
    /// environment
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let fallback_url = vars.get("DATABASE_URL").cloned();
        Self::load(
            fallback_url,
            Environment::with_prefix(ENV_PREFIX).source(Some(vars)),
        )
    }

    fn load(fallback_url: Option<String>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(url) = fallback_url {
            builder = builder.set_default("database.url", url)?;
        }

        builder
            .add_source(
                env.prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Commit retry policy for the record store
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.max(1),
            backoff: Duration::from_millis(self.retry.backoff_ms),
        }
    }

    /// Database URL, if configured
    ///
    /// # Errors
    ///
    /// Returns an error if neither `MOJI__DATABASE__URL` nor `DATABASE_URL`
    /// is set.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::NotFound(
                "database.url (set MOJI__DATABASE__URL or DATABASE_URL)".to_string(),
            ));
        }
        Ok(&self.database.url)
    }
}
