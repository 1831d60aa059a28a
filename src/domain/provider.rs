//! Provider descriptor value objects.
//!
//! A `ProviderDescriptor` is the policy engine's view of one registered
//! adapter: what it can do, what it costs, and how it has been behaving.
//! The metrics collector refreshes the rolling fields continuously; a
//! descriptor that has not been refreshed within the configured TTL is
//! treated as unavailable.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::foundation::{ProviderId, Timestamp};
use super::task::TaskType;

/// Coarse grouping of providers with interchangeable answer quality.
///
/// Cache entries are shared across providers of the same class, so a
/// repeat request may be served from cache even when ranking later
/// prefers a different provider of that class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderClass {
    /// Hosted frontier models.
    Premium,
    /// Hosted general-purpose models.
    Standard,
    /// Locally-served or rule-based backends.
    Local,
}

impl ProviderClass {
    /// Returns the string representation used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderClass::Premium => "premium",
            ProviderClass::Standard => "standard",
            ProviderClass::Local => "local",
        }
    }
}

impl fmt::Display for ProviderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live health of a provider as judged from rolling outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Recent outcomes look normal.
    Healthy,
    /// Elevated failures or latency; usable but outranked by healthy peers.
    Degraded,
    /// Not to be called at all.
    Unavailable,
}

impl HealthState {
    /// True when the policy engine may route to this provider.
    pub fn is_routable(&self) -> bool {
        !matches!(self, HealthState::Unavailable)
    }
}

/// Registry entry describing one provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Adapter identity.
    pub id: ProviderId,
    /// Cache-sharing class.
    pub class: ProviderClass,
    /// Model identifier, checked against the policy allowlist.
    pub model: String,
    /// Task types this adapter can execute.
    pub capabilities: HashSet<TaskType>,
    /// Estimated cost of one call, in cents.
    pub cost_per_call_cents: u32,
    /// Current health judgement.
    pub health: HealthState,
    /// Rolling success rate in [0, 1].
    pub success_rate: f64,
    /// Rolling p95 latency in milliseconds.
    pub p95_latency_ms: u64,
    /// When the rolling fields were last refreshed.
    pub updated_at: Timestamp,
}

impl ProviderDescriptor {
    /// Creates a descriptor with optimistic initial stats.
    pub fn new(
        id: ProviderId,
        class: ProviderClass,
        model: impl Into<String>,
        capabilities: impl IntoIterator<Item = TaskType>,
        cost_per_call_cents: u32,
    ) -> Self {
        Self {
            id,
            class,
            model: model.into(),
            capabilities: capabilities.into_iter().collect(),
            cost_per_call_cents,
            health: HealthState::Healthy,
            success_rate: 1.0,
            p95_latency_ms: 0,
            updated_at: Timestamp::now(),
        }
    }

    /// Whether this provider can execute the given task type.
    pub fn supports(&self, task_type: TaskType) -> bool {
        self.capabilities.contains(&task_type)
    }

    /// True if the descriptor has not been refreshed within the TTL.
    pub fn is_stale(&self, ttl_secs: u64, now: Timestamp) -> bool {
        now.duration_since(&self.updated_at).num_seconds() > ttl_secs as i64
    }

    /// Health after applying staleness: stale descriptors are unavailable.
    pub fn effective_health(&self, ttl_secs: u64, now: Timestamp) -> HealthState {
        if self.is_stale(ttl_secs, now) {
            HealthState::Unavailable
        } else {
            self.health
        }
    }
}
