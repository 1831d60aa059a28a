//! Task request value objects: what a domain service asks the AI core to do.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use super::foundation::{CallerId, RequestId, ValidationError};

/// Enumerated category of AI work the orchestrator can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Semantic search over the parts catalog.
    Search,
    /// Intent classification of a customer message.
    Classification,
    /// Suggestion generation (follow-ups, alternatives, upsells).
    Suggestion,
}

impl TaskType {
    /// All task types, in a stable order.
    pub fn all() -> [TaskType; 3] {
        [
            TaskType::Search,
            TaskType::Classification,
            TaskType::Suggestion,
        ]
    }

    /// Whether this task requires a non-empty text payload.
    pub fn requires_text(&self) -> bool {
        match self {
            TaskType::Search | TaskType::Classification | TaskType::Suggestion => true,
        }
    }

    /// Returns the string representation used in cache keys and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Search => "search",
            TaskType::Classification => "classification",
            TaskType::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relative priority of a request within the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Service tier of the caller, used by the policy engine and rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerTier {
    Free,
    Standard,
    Premium,
}

impl Default for CallerTier {
    fn default() -> Self {
        CallerTier::Free
    }
}

impl CallerTier {
    /// Returns the string representation used in rate-limit keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallerTier::Free => "free",
            CallerTier::Standard => "standard",
            CallerTier::Premium => "premium",
        }
    }
}

/// Identity and tier of the calling service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Who is calling.
    pub caller_id: CallerId,
    /// Service tier for rate limiting and provider ranking.
    pub tier: CallerTier,
}

impl CallerContext {
    /// Creates a new caller context.
    pub fn new(caller_id: CallerId, tier: CallerTier) -> Self {
        Self { caller_id, tier }
    }
}

/// Wall-clock budget for one request, shared across the whole fallback chain.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// Creates a deadline expiring after the given duration.
    pub fn from_now(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
        }
    }

    /// Creates a deadline at an absolute instant.
    pub fn at(expires_at: Instant) -> Self {
        Self { expires_at }
    }

    /// Remaining time, floored at zero.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// True once no time is left.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Caps a desired duration to what the deadline still allows.
    pub fn clamp(&self, desired: Duration) -> Duration {
        desired.min(self.remaining())
    }
}

/// One call into the orchestrator. Created per request, dropped after response.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Unique identity of this call, for logs and trace correlation.
    pub id: RequestId,
    /// Category of AI work.
    pub task_type: TaskType,
    /// Raw caller input; sanitized before leaving the trust boundary.
    pub payload: String,
    /// Caller identity and tier.
    pub caller: CallerContext,
    /// Relative priority.
    pub priority: Priority,
    /// Wall-clock budget for the whole request.
    pub deadline: Deadline,
}

impl TaskRequest {
    /// Creates a request after validating the input constraint:
    /// payload must be non-empty when the task requires text.
    pub fn new(
        task_type: TaskType,
        payload: impl Into<String>,
        caller: CallerContext,
        priority: Priority,
        deadline: Deadline,
    ) -> Result<Self, ValidationError> {
        let payload = payload.into();
        if task_type.requires_text() && payload.trim().is_empty() {
            return Err(ValidationError::empty_field("payload"));
        }
        Ok(Self {
            id: RequestId::new(),
            task_type,
            payload,
            caller,
            priority,
            deadline,
        })
    }
}
