//! Response cache port.
//!
//! Cache entries are keyed by a stable hash of (task type, sanitized
//! context, provider class) and are immutable once written. Content is
//! deterministic for identical input, so concurrent writers for the same
//! key may race harmlessly.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::domain::foundation::Timestamp;
use crate::domain::{ProviderClass, SanitizedContext, TaskResult, TaskType};

/// Stable cache key for one (task, context, provider class) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Computes the key as a SHA-256 digest over the three components.
    ///
    /// Components are length-prefixed so distinct inputs can never collide
    /// by concatenation.
    pub fn compute(
        task_type: TaskType,
        context: &SanitizedContext,
        provider_class: ProviderClass,
    ) -> Self {
        let mut hasher = Sha256::new();
        for part in [
            task_type.as_str(),
            context.content().as_str(),
            provider_class.as_str(),
        ] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        Self(format!("{digest:x}"))
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One cached canonical result. Immutable once written.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The canonical result that was produced.
    pub result: TaskResult,
    /// When the entry was written.
    pub created_at: Timestamp,
    /// Lifetime in seconds; the entry expires at `created_at + ttl`.
    pub ttl_secs: u64,
}

impl CacheEntry {
    /// Creates an entry expiring `ttl_secs` from now.
    pub fn new(result: TaskResult, ttl_secs: u64) -> Self {
        Self {
            result,
            created_at: Timestamp::now(),
            ttl_secs,
        }
    }

    /// True once the entry has outlived its TTL.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.duration_since(&self.created_at).num_seconds() > self.ttl_secs as i64
    }
}

/// Port for the response cache store.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Returns a non-expired entry for the key, if any.
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Returns the entry for the key even if expired.
    ///
    /// Used only by graceful degradation, which prefers a stale answer
    /// over an empty one.
    async fn get_stale(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Stores an entry. Idempotent for identical input.
    async fn put(&self, key: CacheKey, entry: CacheEntry);

    /// Drops expired entries. Called opportunistically.
    async fn purge_expired(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SanitizedContext;

    fn context(content: &str) -> SanitizedContext {
        SanitizedContext::new(
            TaskType::Search,
            vec![content.to_string()],
            format!("Search: {content}"),
            4,
            0,
        )
    }

    #[test]
    fn identical_inputs_produce_identical_keys() {
        let a = CacheKey::compute(TaskType::Search, &context("brake pads"), ProviderClass::Premium);
        let b = CacheKey::compute(TaskType::Search, &context("brake pads"), ProviderClass::Premium);
        assert_eq!(a, b);
    }

    #[test]
    fn different_task_types_produce_different_keys() {
        let a = CacheKey::compute(TaskType::Search, &context("brake pads"), ProviderClass::Premium);
        let b = CacheKey::compute(
            TaskType::Suggestion,
            &context("brake pads"),
            ProviderClass::Premium,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn different_provider_classes_produce_different_keys() {
        let a = CacheKey::compute(TaskType::Search, &context("brake pads"), ProviderClass::Premium);
        let b = CacheKey::compute(TaskType::Search, &context("brake pads"), ProviderClass::Local);
        assert_ne!(a, b);
    }

    #[test]
    fn fresh_entry_is_not_expired() {
        let entry = CacheEntry::new(TaskResult::empty_for(TaskType::Search), 60);
        assert!(!entry.is_expired(Timestamp::now()));
    }

    #[test]
    fn entry_expires_after_ttl() {
        let mut entry = CacheEntry::new(TaskResult::empty_for(TaskType::Search), 60);
        entry.created_at = Timestamp::now().minus_secs(120);
        assert!(entry.is_expired(Timestamp::now()));
    }
}
