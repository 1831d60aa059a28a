//! Provider adapter port - the black-box contract every AI backend implements.
//!
//! The orchestrator never talks to a concrete provider API directly; it only
//! sees this trait. Concrete bindings (HTTP clients, local models) live
//! outside this crate and are registered explicitly - there is no runtime
//! plug-in discovery.
//!
//! # Example
//!
//! ```ignore
//! struct LocalRulesAdapter;
//!
//! #[async_trait]
//! impl ProviderAdapter for LocalRulesAdapter {
//!     async fn execute_task(
//!         &self,
//!         task_type: TaskType,
//!         context: &SanitizedContext,
//!         config: &ProviderCallConfig,
//!     ) -> Result<RawProviderResponse, ProviderError> {
//!         // ...
//!     }
//!     // ... other methods
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::domain::foundation::ProviderId;
use crate::domain::{ProviderClass, SanitizedContext, TaskType};

/// Port for executing AI tasks against one backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Executes one task attempt. Must respect `config.timeout`.
    async fn execute_task(
        &self,
        task_type: TaskType,
        context: &SanitizedContext,
        config: &ProviderCallConfig,
    ) -> Result<RawProviderResponse, ProviderError>;

    /// Cheap liveness probe; false means skip this adapter entirely.
    fn is_available(&self) -> bool;

    /// Task types this adapter can execute.
    fn capabilities(&self) -> HashSet<TaskType>;

    /// Estimated cost of executing against this context, in cents.
    fn estimated_cost(&self, context: &SanitizedContext) -> u32;

    /// Adapter identity, registered with the provider registry.
    fn id(&self) -> ProviderId;

    /// Cache-sharing class of this adapter.
    fn class(&self) -> ProviderClass;

    /// Model identifier, checked against the policy allowlist.
    fn model(&self) -> String;
}

/// Per-call configuration derived from the active policy snapshot.
#[derive(Debug, Clone)]
pub struct ProviderCallConfig {
    /// Hard timeout for this single attempt.
    pub timeout: Duration,
    /// Maximum tokens the provider may generate.
    pub max_tokens: u32,
}

impl ProviderCallConfig {
    /// Creates a call config.
    pub fn new(timeout: Duration, max_tokens: u32) -> Self {
        Self {
            timeout,
            max_tokens,
        }
    }
}

/// Raw, un-normalized output of one provider call.
///
/// `body` is provider-shaped JSON; the normalizer validates and converts it
/// before anything leaves the subsystem.
#[derive(Debug, Clone)]
pub struct RawProviderResponse {
    /// Provider-specific response body.
    pub body: Value,
    /// Tokens consumed by the call.
    pub tokens_used: u32,
    /// Actual or estimated cost in cents.
    pub cost_cents: u32,
    /// Model that answered.
    pub model: String,
}

impl RawProviderResponse {
    /// Creates a raw response.
    pub fn new(body: Value, tokens_used: u32, cost_cents: u32, model: impl Into<String>) -> Self {
        Self {
            body,
            tokens_used,
            cost_cents,
            model: model.into(),
        }
    }
}

/// Failures a provider attempt can produce.
///
/// All variants are absorbed by the fallback manager; none reach the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The attempt exceeded its timeout.
    #[error("provider timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before giving up.
        elapsed_ms: u64,
    },

    /// Backend-side failure (5xx-equivalent, connection refused, overload).
    #[error("provider error: {message}")]
    Provider {
        /// Error details.
        message: String,
    },

    /// The provider rejected the payload (too large, malformed, filtered),
    /// or its response failed normalization.
    #[error("provider validation error: {message}")]
    Validation {
        /// Rejection details.
        message: String,
    },
}

impl ProviderError {
    /// Creates a timeout error.
    pub fn timeout(elapsed_ms: u64) -> Self {
        Self::Timeout { elapsed_ms }
    }

    /// Creates a backend failure error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Creates a payload-rejection error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True for failures worth retrying with backoff (timeout/5xx-equivalent).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Provider { .. })
    }

    /// True for failures worth retrying with a smaller context.
    pub fn is_payload_rejection(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
