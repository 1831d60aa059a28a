//! In-memory fixed-window rate limiter.
//!
//! One counter per storage key, aligned to wall-clock windows (all
//! per-minute windows roll over at the same second, daily windows at UTC
//! midnight). Check-and-consume is atomic per key through the map's
//! per-entry locking; a denied request never increments the counter.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter, WindowLimit,
};

#[derive(Debug, Clone, Copy)]
struct WindowState {
    window_index: u64,
    count: u32,
}

/// Process-local rate limiter.
#[derive(Default)]
pub struct InMemoryRateLimiter {
    windows: DashMap<String, WindowState>,
}

impl InMemoryRateLimiter {
    /// Creates a limiter with no recorded windows.
    pub fn new() -> Self {
        Self::default()
    }

    fn window_index(now: Timestamp, limit: WindowLimit) -> u64 {
        now.as_unix_secs() / u64::from(limit.window_secs.max(1))
    }

    fn reset_at(window_index: u64, limit: WindowLimit) -> Timestamp {
        Timestamp::from_unix_secs((window_index + 1) * u64::from(limit.window_secs.max(1)))
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey, limit: WindowLimit) -> RateLimitResult {
        let now = Timestamp::now();
        let index = Self::window_index(now, limit);
        let mut state = self
            .windows
            .entry(key.storage_key())
            .or_insert(WindowState {
                window_index: index,
                count: 0,
            });
        if state.window_index != index {
            state.window_index = index;
            state.count = 0;
        }

        if state.count >= limit.max_requests {
            let reset = Self::reset_at(index, limit);
            let retry_after_secs = reset.duration_since(&now).num_seconds().max(0) as u32;
            return RateLimitResult::Denied(RateLimitDenied {
                limit: limit.max_requests,
                retry_after_secs,
            });
        }

        state.count += 1;
        RateLimitResult::Allowed(RateLimitStatus {
            limit: limit.max_requests,
            remaining: limit.max_requests - state.count,
            reset_at: Self::reset_at(index, limit),
        })
    }

    async fn status(&self, key: RateLimitKey, limit: WindowLimit) -> RateLimitStatus {
        let now = Timestamp::now();
        let index = Self::window_index(now, limit);
        let count = self
            .windows
            .get(&key.storage_key())
            .filter(|state| state.window_index == index)
            .map(|state| state.count)
            .unwrap_or(0);
        RateLimitStatus {
            limit: limit.max_requests,
            remaining: limit.max_requests.saturating_sub(count),
            reset_at: Self::reset_at(index, limit),
        }
    }

    async fn reset(&self, key: RateLimitKey) {
        self.windows.remove(&key.storage_key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::CallerId;
    use crate::domain::TaskType;

    fn caller_key() -> RateLimitKey {
        RateLimitKey::caller_task(CallerId::new("parts-service").unwrap(), TaskType::Search)
    }

    #[tokio::test]
    async fn allows_up_to_the_limit_then_denies() {
        let limiter = InMemoryRateLimiter::new();
        let limit = WindowLimit::per_minute(3);

        for _ in 0..3 {
            assert!(limiter.check(caller_key(), limit).await.is_allowed());
        }
        let denied = limiter.check(caller_key(), limit).await;
        assert!(denied.is_denied());
        if let RateLimitResult::Denied(d) = denied {
            assert_eq!(d.limit, 3);
            assert!(d.retry_after_secs <= 60);
        }
    }

    #[tokio::test]
    async fn denied_request_does_not_consume() {
        let limiter = InMemoryRateLimiter::new();
        let limit = WindowLimit::per_minute(1);

        assert!(limiter.check(caller_key(), limit).await.is_allowed());
        assert!(limiter.check(caller_key(), limit).await.is_denied());

        // Still exactly one consumed.
        let status = limiter.status(caller_key(), limit).await;
        assert_eq!(status.remaining, 0);
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let limiter = InMemoryRateLimiter::new();
        let limit = WindowLimit::per_minute(1);

        assert!(limiter.check(caller_key(), limit).await.is_allowed());
        assert!(limiter
            .check(RateLimitKey::GlobalDaily, WindowLimit::per_day(10))
            .await
            .is_allowed());

        let other = RateLimitKey::caller_task(
            CallerId::new("chat-service").unwrap(),
            TaskType::Search,
        );
        assert!(limiter.check(other, limit).await.is_allowed());
    }

    #[tokio::test]
    async fn status_does_not_consume() {
        let limiter = InMemoryRateLimiter::new();
        let limit = WindowLimit::per_minute(5);

        for _ in 0..3 {
            let status = limiter.status(caller_key(), limit).await;
            assert_eq!(status.remaining, 5);
        }
    }

    #[tokio::test]
    async fn reset_clears_the_window() {
        let limiter = InMemoryRateLimiter::new();
        let limit = WindowLimit::per_minute(1);

        assert!(limiter.check(caller_key(), limit).await.is_allowed());
        assert!(limiter.check(caller_key(), limit).await.is_denied());

        limiter.reset(caller_key()).await;
        assert!(limiter.check(caller_key(), limit).await.is_allowed());
    }
}
