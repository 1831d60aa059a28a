//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading.
///
/// Components that depend on configuration fail closed on these: the
/// context builder refuses to exist without a valid redaction ruleset,
/// and a failed hot reload leaves the previous snapshot active.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Timeout '{0}' must be greater than zero")]
    InvalidTimeout(&'static str),

    #[error("Scoring weight '{name}' must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("Token budget for '{task}' must be at least the minimum required ({min})")]
    TokenBudgetTooSmall { task: &'static str, min: u32 },

    #[error("Redaction pattern '{pattern}' is invalid: {reason}")]
    InvalidRedactionPattern { pattern: String, reason: String },

    #[error("Cache TTL must be greater than zero")]
    InvalidCacheTtl,
}
