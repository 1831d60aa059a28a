//! In-memory response cache.
//!
//! Backed by a concurrent map with per-key locking. Entries are immutable
//! once written; expiry is checked on read and expired entries are swept by
//! `purge_expired`, which the orchestrator calls opportunistically. Expired
//! entries are deliberately kept until purged so graceful degradation can
//! serve a stale answer instead of an empty one.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::foundation::Timestamp;
use crate::ports::{CacheEntry, CacheKey, ResponseCache};

/// Process-local cache of canonical results.
#[derive(Default)]
pub struct InMemoryResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl InMemoryResponseCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Timestamp::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value().clone())
    }

    async fn get_stale(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    async fn purge_expired(&self) {
        let now = Timestamp::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProviderClass, SanitizedContext, TaskResult, TaskType};

    fn key(content: &str) -> CacheKey {
        let context = SanitizedContext::new(
            TaskType::Search,
            vec![content.to_string()],
            format!("Search: {content}"),
            4,
            0,
        );
        CacheKey::compute(TaskType::Search, &context, ProviderClass::Local)
    }

    fn expired_entry() -> CacheEntry {
        let mut entry = CacheEntry::new(TaskResult::empty_for(TaskType::Search), 60);
        entry.created_at = Timestamp::now().minus_secs(120);
        entry
    }

    #[tokio::test]
    async fn get_returns_fresh_entries() {
        let cache = InMemoryResponseCache::new();
        let key = key("brake pads");
        cache
            .put(
                key.clone(),
                CacheEntry::new(TaskResult::empty_for(TaskType::Search), 60),
            )
            .await;
        assert!(cache.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn get_hides_expired_entries_but_get_stale_serves_them() {
        let cache = InMemoryResponseCache::new();
        let key = key("brake pads");
        cache.put(key.clone(), expired_entry()).await;

        assert!(cache.get(&key).await.is_none());
        assert!(cache.get_stale(&key).await.is_some());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let cache = InMemoryResponseCache::new();
        let stale_key = key("old");
        let fresh_key = key("new");
        cache.put(stale_key.clone(), expired_entry()).await;
        cache
            .put(
                fresh_key.clone(),
                CacheEntry::new(TaskResult::empty_for(TaskType::Search), 60),
            )
            .await;

        cache.purge_expired().await;
        assert_eq!(cache.len(), 1);
        assert!(cache.get_stale(&stale_key).await.is_none());
        assert!(cache.get(&fresh_key).await.is_some());
    }

    #[tokio::test]
    async fn put_overwrites_idempotently() {
        let cache = InMemoryResponseCache::new();
        let key = key("brake pads");
        for _ in 0..2 {
            cache
                .put(
                    key.clone(),
                    CacheEntry::new(TaskResult::empty_for(TaskType::Search), 60),
                )
                .await;
        }
        assert_eq!(cache.len(), 1);
    }
}
