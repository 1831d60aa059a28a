//! Error types for the domain layer.
//!
//! `OrchestratorError` is the only error surface callers of the orchestrator
//! ever see: input validation and policy rejection. Provider-side failures
//! are absorbed by the fallback chain and resolve into degraded responses.

use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Caller-visible errors from the orchestrator.
///
/// Provider timeouts, provider errors and malformed provider responses are
/// never surfaced here; they are consumed by the fallback strategies and at
/// worst produce a degraded response.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// The request itself is malformed (caller error, never retried).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The context is still over the token budget after summarization.
    #[error("context too large: {tokens} tokens exceeds budget of {budget}")]
    ContextTooLarge {
        /// Token count after truncation.
        tokens: u32,
        /// Active budget for the task type.
        budget: u32,
    },

    /// A per-caller or global rate window is exhausted.
    ///
    /// Fast-failed before any provider I/O.
    #[error("rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimitExceeded {
        /// Seconds until the window resets.
        retry_after_secs: u32,
    },

    /// The daily cost budget is exhausted.
    ///
    /// Fast-failed before any provider I/O.
    #[error("budget exceeded: {spent_cents} cents spent, limit is {limit_cents} cents")]
    BudgetExceeded {
        /// Amount already spent today.
        spent_cents: u32,
        /// Maximum allowed.
        limit_cents: u32,
    },
}

impl OrchestratorError {
    /// Creates an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Creates a context too large error.
    pub fn context_too_large(tokens: u32, budget: u32) -> Self {
        Self::ContextTooLarge { tokens, budget }
    }

    /// Returns true if the error is a pre-I/O policy rejection.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded { .. } | Self::BudgetExceeded { .. }
        )
    }
}

impl From<ValidationError> for OrchestratorError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
