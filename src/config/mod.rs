//! Application configuration module.
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `AI_ORCHESTRATOR` prefix; nested values use `__` as separator.
//!
//! # Example
//!
//! ```no_run
//! use ai_orchestrator::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod error;
mod policy;
mod redaction;

pub use error::{ConfigError, ValidationError};
pub use policy::{PolicyConfig, PolicyStore, ScoringWeights, TokenBudgets};
pub use redaction::{CustomPattern, RedactionConfig};

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Policy snapshot loaded at startup (version 0 unless set).
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Redaction ruleset.
    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Loads a `.env` file if present, then reads variables with the
    /// `AI_ORCHESTRATOR` prefix and `__` separators:
    ///
    /// - `AI_ORCHESTRATOR__POLICY__CACHE_TTL_SECS=600` -> `policy.cache_ttl_secs = 600`
    /// - `AI_ORCHESTRATOR__POLICY__AI_ENABLED=false` -> `policy.ai_enabled = false`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into the expected
    /// types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("AI_ORCHESTRATOR")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any value is semantically invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.policy.validate()?;
        self.redaction.validate()?;
        Ok(())
    }
}
