//! Budget tracker port - daily AI spend accounting.
//!
//! Tracks cost per caller and globally, per UTC day. The orchestrator
//! reserves an estimated cost atomically before any provider I/O; rejected
//! requests therefore never consume network resources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CallerId, Timestamp};
use crate::domain::TaskType;

/// Record of spend for a single completed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendRecord {
    /// Caller that incurred the cost.
    pub caller_id: CallerId,
    /// Task category.
    pub task_type: TaskType,
    /// Actual cost in cents.
    pub cost_cents: u32,
    /// Tokens consumed.
    pub tokens: u32,
    /// When the spend occurred.
    pub occurred_at: Timestamp,
}

impl SpendRecord {
    /// Creates a new spend record stamped now.
    pub fn new(caller_id: CallerId, task_type: TaskType, cost_cents: u32, tokens: u32) -> Self {
        Self {
            caller_id,
            task_type,
            cost_cents,
            tokens,
            occurred_at: Timestamp::now(),
        }
    }
}

/// Daily budget limits taken from the active policy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLimits {
    /// Per-caller daily ceiling in cents.
    pub caller_daily_cents: u32,
    /// Global daily ceiling in cents.
    pub global_daily_cents: u32,
}

/// Outcome of a budget reservation attempt.
#[derive(Debug, Clone)]
pub enum BudgetDecision {
    /// Reservation succeeded.
    Allowed {
        /// Cents remaining for the caller after the reservation.
        caller_remaining_cents: u32,
    },
    /// Reservation rejected.
    Denied {
        /// Cents already spent in the exhausted window.
        spent_cents: u32,
        /// The ceiling that was hit.
        limit_cents: u32,
    },
}

impl BudgetDecision {
    /// Returns true if the reservation succeeded.
    pub fn is_allowed(&self) -> bool {
        matches!(self, BudgetDecision::Allowed { .. })
    }
}

/// Status of spend relative to a limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetStatus {
    /// Under the limit, no concerns.
    UnderLimit {
        /// Cents remaining before limit.
        remaining_cents: u32,
    },
    /// Approaching the limit (>= 80% used).
    Warning {
        /// Cents remaining before limit.
        remaining_cents: u32,
        /// Percentage of limit used.
        percent_used: u8,
    },
    /// At or over the limit.
    AtLimit,
}

impl BudgetStatus {
    /// Calculates limit status from current spend and limit.
    pub fn from_spend(current_cents: u32, limit_cents: u32) -> Self {
        if limit_cents == 0 || current_cents >= limit_cents {
            return Self::AtLimit;
        }
        let remaining = limit_cents - current_cents;
        let percent_used = ((current_cents as f64 / limit_cents as f64) * 100.0) as u8;
        if percent_used >= 80 {
            Self::Warning {
                remaining_cents: remaining,
                percent_used,
            }
        } else {
            Self::UnderLimit {
                remaining_cents: remaining,
            }
        }
    }

    /// Returns true if further spend should be blocked.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::AtLimit)
    }
}

/// Port for daily budget accounting.
#[async_trait]
pub trait BudgetTracker: Send + Sync {
    /// Atomically checks both daily windows and reserves `estimated_cents`.
    ///
    /// A denied reservation leaves both windows untouched.
    async fn reserve(
        &self,
        caller: &CallerId,
        estimated_cents: u32,
        limits: BudgetLimits,
    ) -> BudgetDecision;

    /// Records the actual spend of a completed request, replacing its
    /// reservation estimate.
    async fn record(&self, record: SpendRecord, reserved_cents: u32);

    /// Total cents spent by a caller today (UTC).
    async fn daily_spend(&self, caller: &CallerId) -> u32;

    /// Total cents spent globally today (UTC).
    async fn global_daily_spend(&self) -> u32;

    /// Status of a caller's spend against a limit.
    async fn limit_status(&self, caller: &CallerId, limit_cents: u32) -> BudgetStatus;
}
