//! Sanitized context value object.
//!
//! The only representation of caller input allowed to cross the trust
//! boundary to a provider. Built by the context builder; immutable after
//! construction.

use serde::{Deserialize, Serialize};

use super::task::TaskType;

/// Privacy-safe, token-bounded, task-specific context.
///
/// Invariants upheld by the context builder:
/// - no unmasked PII pattern remains in any fragment or the prompt;
/// - `token_count` never exceeds the active policy budget for the task type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedContext {
    task_type: TaskType,
    fragments: Vec<String>,
    prompt: String,
    token_count: u32,
    redactions_applied: u32,
}

impl SanitizedContext {
    /// Assembles a sanitized context from already-redacted, already-bounded parts.
    pub fn new(
        task_type: TaskType,
        fragments: Vec<String>,
        prompt: String,
        token_count: u32,
        redactions_applied: u32,
    ) -> Self {
        Self {
            task_type,
            fragments,
            prompt,
            token_count,
            redactions_applied,
        }
    }

    /// Task this context was built for.
    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Retained content fragments, oldest first.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// The rendered, task-specific prompt sent to providers.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Estimated token count of the prompt.
    pub fn token_count(&self) -> u32 {
        self.token_count
    }

    /// Number of PII matches that were masked while building this context.
    pub fn redactions_applied(&self) -> u32 {
        self.redactions_applied
    }

    /// Joined fragment content, used for cache keying.
    pub fn content(&self) -> String {
        self.fragments.join("\n")
    }
}
