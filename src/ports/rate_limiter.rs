//! Rate limiting port for protecting provider budgets and upstream APIs.
//!
//! Counters use a fixed-window algorithm and are keyed per
//! (caller, task type) plus one global daily window. Limits themselves are
//! not stored here: each check receives the window limit from the policy
//! snapshot captured at request start, so a hot config reload never affects
//! an in-flight request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{CallerId, Timestamp};
use crate::domain::TaskType;

/// Port for rate limiting operations.
///
/// Implementations must be safe for concurrent use and must check-and-consume
/// atomically per key: a denied request never consumes a token.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Checks if a request is allowed under `limit`, consuming one token if so.
    async fn check(&self, key: RateLimitKey, limit: WindowLimit) -> RateLimitResult;

    /// Current status without consuming a token.
    async fn status(&self, key: RateLimitKey, limit: WindowLimit) -> RateLimitStatus;

    /// Clears the window for a key (admin operation).
    async fn reset(&self, key: RateLimitKey);
}

/// Key identifying what to rate limit.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    /// Per-caller, per-task-type window.
    CallerTask {
        /// The calling service.
        caller: CallerId,
        /// Task category being limited.
        task_type: TaskType,
    },
    /// One global window shared by all callers, reset daily.
    GlobalDaily,
}

impl RateLimitKey {
    /// Creates a per-caller key.
    pub fn caller_task(caller: CallerId, task_type: TaskType) -> Self {
        Self::CallerTask { caller, task_type }
    }

    /// Returns the storage key string for this rate limit key.
    pub fn storage_key(&self) -> String {
        match self {
            Self::CallerTask { caller, task_type } => {
                format!("ratelimit:caller:{}:{}", caller, task_type)
            }
            Self::GlobalDaily => "ratelimit:global:daily".to_string(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// A window limit taken from the active policy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimit {
    /// Maximum requests allowed in the window.
    pub max_requests: u32,
    /// Window duration in seconds.
    pub window_secs: u32,
}

impl WindowLimit {
    /// Creates a window limit.
    pub fn new(max_requests: u32, window_secs: u32) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// A per-minute limit.
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, 60)
    }

    /// A per-day limit.
    pub fn per_day(max_requests: u32) -> Self {
        Self::new(max_requests, 86_400)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed; includes current status.
    Allowed(RateLimitStatus),
    /// Request is denied; includes denial details.
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    /// Returns true if the request was allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    /// Returns true if the request was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Current rate limit status.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Remaining requests in the current window.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: Timestamp,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone)]
pub struct RateLimitDenied {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Seconds until the caller should retry.
    pub retry_after_secs: u32,
}
