//! In-memory daily budget tracker.
//!
//! Spend is accounted per UTC day for each caller and globally. Both
//! ceilings are checked and the estimate reserved under one lock, so two
//! concurrent requests can never both squeeze past the same remaining
//! budget. When the actual cost is known the reservation is replaced.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::foundation::{CallerId, Timestamp};
use crate::ports::{BudgetDecision, BudgetLimits, BudgetStatus, BudgetTracker, SpendRecord};

#[derive(Default)]
struct DayState {
    day: u64,
    caller_spend: HashMap<String, u32>,
    global_spend: u32,
}

impl DayState {
    fn roll(&mut self, today: u64) {
        if self.day != today {
            self.day = today;
            self.caller_spend.clear();
            self.global_spend = 0;
        }
    }
}

/// Process-local budget accounting.
#[derive(Default)]
pub struct InMemoryBudgetTracker {
    state: Mutex<DayState>,
}

impl InMemoryBudgetTracker {
    /// Creates a tracker with zero spend.
    pub fn new() -> Self {
        Self::default()
    }

    fn today() -> u64 {
        Timestamp::now().as_unix_secs() / 86_400
    }
}

#[async_trait]
impl BudgetTracker for InMemoryBudgetTracker {
    async fn reserve(
        &self,
        caller: &CallerId,
        estimated_cents: u32,
        limits: BudgetLimits,
    ) -> BudgetDecision {
        let mut state = self.state.lock().await;
        state.roll(Self::today());

        let caller_spent = state
            .caller_spend
            .get(caller.as_str())
            .copied()
            .unwrap_or(0);
        if caller_spent.saturating_add(estimated_cents) > limits.caller_daily_cents {
            return BudgetDecision::Denied {
                spent_cents: caller_spent,
                limit_cents: limits.caller_daily_cents,
            };
        }
        if state.global_spend.saturating_add(estimated_cents) > limits.global_daily_cents {
            return BudgetDecision::Denied {
                spent_cents: state.global_spend,
                limit_cents: limits.global_daily_cents,
            };
        }

        let new_caller_spent = caller_spent + estimated_cents;
        state
            .caller_spend
            .insert(caller.as_str().to_string(), new_caller_spent);
        state.global_spend += estimated_cents;
        BudgetDecision::Allowed {
            caller_remaining_cents: limits.caller_daily_cents - new_caller_spent,
        }
    }

    async fn record(&self, record: SpendRecord, reserved_cents: u32) {
        let mut state = self.state.lock().await;
        state.roll(Self::today());

        let entry = state
            .caller_spend
            .entry(record.caller_id.as_str().to_string())
            .or_insert(0);
        *entry = entry
            .saturating_sub(reserved_cents)
            .saturating_add(record.cost_cents);
        state.global_spend = state
            .global_spend
            .saturating_sub(reserved_cents)
            .saturating_add(record.cost_cents);
    }

    async fn daily_spend(&self, caller: &CallerId) -> u32 {
        let mut state = self.state.lock().await;
        state.roll(Self::today());
        state
            .caller_spend
            .get(caller.as_str())
            .copied()
            .unwrap_or(0)
    }

    async fn global_daily_spend(&self) -> u32 {
        let mut state = self.state.lock().await;
        state.roll(Self::today());
        state.global_spend
    }

    async fn limit_status(&self, caller: &CallerId, limit_cents: u32) -> BudgetStatus {
        let spent = self.daily_spend(caller).await;
        BudgetStatus::from_spend(spent, limit_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;

    fn caller() -> CallerId {
        CallerId::new("parts-service").unwrap()
    }

    fn limits(caller_cents: u32, global_cents: u32) -> BudgetLimits {
        BudgetLimits {
            caller_daily_cents: caller_cents,
            global_daily_cents: global_cents,
        }
    }

    #[tokio::test]
    async fn reserve_within_limits_is_allowed() {
        let tracker = InMemoryBudgetTracker::new();
        let decision = tracker.reserve(&caller(), 30, limits(100, 1_000)).await;
        assert!(decision.is_allowed());
        if let BudgetDecision::Allowed {
            caller_remaining_cents,
        } = decision
        {
            assert_eq!(caller_remaining_cents, 70);
        }
        assert_eq!(tracker.daily_spend(&caller()).await, 30);
        assert_eq!(tracker.global_daily_spend().await, 30);
    }

    #[tokio::test]
    async fn caller_ceiling_denies_without_consuming() {
        let tracker = InMemoryBudgetTracker::new();
        assert!(tracker.reserve(&caller(), 90, limits(100, 1_000)).await.is_allowed());

        let denied = tracker.reserve(&caller(), 20, limits(100, 1_000)).await;
        assert!(!denied.is_allowed());
        // The denied reservation left spend untouched.
        assert_eq!(tracker.daily_spend(&caller()).await, 90);
        assert_eq!(tracker.global_daily_spend().await, 90);
    }

    #[tokio::test]
    async fn global_ceiling_applies_across_callers() {
        let tracker = InMemoryBudgetTracker::new();
        let other = CallerId::new("chat-service").unwrap();
        assert!(tracker.reserve(&caller(), 60, limits(100, 100)).await.is_allowed());

        let denied = tracker.reserve(&other, 50, limits(100, 100)).await;
        assert!(!denied.is_allowed());
        if let BudgetDecision::Denied {
            spent_cents,
            limit_cents,
        } = denied
        {
            assert_eq!(spent_cents, 60);
            assert_eq!(limit_cents, 100);
        }
    }

    #[tokio::test]
    async fn record_replaces_the_reservation_with_actual_cost() {
        let tracker = InMemoryBudgetTracker::new();
        assert!(tracker.reserve(&caller(), 50, limits(100, 1_000)).await.is_allowed());

        tracker
            .record(SpendRecord::new(caller(), TaskType::Search, 12, 240), 50)
            .await;
        assert_eq!(tracker.daily_spend(&caller()).await, 12);
        assert_eq!(tracker.global_daily_spend().await, 12);
    }

    #[tokio::test]
    async fn limit_status_tracks_thresholds() {
        let tracker = InMemoryBudgetTracker::new();
        assert!(tracker.reserve(&caller(), 85, limits(100, 1_000)).await.is_allowed());

        let status = tracker.limit_status(&caller(), 100).await;
        assert!(matches!(status, BudgetStatus::Warning { .. }));
    }
}
