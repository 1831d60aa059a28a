//! Versioned policy configuration.
//!
//! A `PolicyConfig` is an immutable snapshot of every knob the orchestrator
//! consults: rate limits, budgets, per-strategy timeouts, retry counts, the
//! model allowlist, provider weight overrides, cache TTL and per-task token
//! budgets. The `PolicyStore` holds the active snapshot; `install()` swaps
//! it for subsequent requests while in-flight requests keep the snapshot
//! they captured at start.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::TaskType;
use crate::ports::{BudgetLimits, WindowLimit};

use super::error::ValidationError;

/// Weights for the policy engine's provider scoring formula.
///
/// The formula itself is configurable; the only fixed rule is that healthy
/// providers always outrank degraded ones, which is applied as a tier
/// before these weights.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringWeights {
    /// Weight of (inverse) estimated cost.
    #[serde(default = "default_cost_weight")]
    pub cost: f64,

    /// Weight of rolling success rate.
    #[serde(default = "default_success_weight")]
    pub success_rate: f64,

    /// Weight of (inverse) rolling p95 latency.
    #[serde(default = "default_latency_weight")]
    pub latency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cost: default_cost_weight(),
            success_rate: default_success_weight(),
            latency: default_latency_weight(),
        }
    }
}

/// Per-task-type token budgets for sanitized contexts.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenBudgets {
    #[serde(default = "default_search_budget")]
    pub search: u32,

    #[serde(default = "default_classification_budget")]
    pub classification: u32,

    #[serde(default = "default_suggestion_budget")]
    pub suggestion: u32,

    /// Smallest context that is still useful; below this the builder
    /// raises `ContextTooLarge` instead of truncating further.
    #[serde(default = "default_min_required_tokens")]
    pub min_required: u32,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            search: default_search_budget(),
            classification: default_classification_budget(),
            suggestion: default_suggestion_budget(),
            min_required: default_min_required_tokens(),
        }
    }
}

impl TokenBudgets {
    /// Budget for a task type.
    pub fn budget_for(&self, task_type: TaskType) -> u32 {
        match task_type {
            TaskType::Search => self.search,
            TaskType::Classification => self.classification,
            TaskType::Suggestion => self.suggestion,
        }
    }
}

/// Immutable, versioned policy snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Monotonic version of this snapshot.
    #[serde(default)]
    pub version: u64,

    /// Global kill switch: when false, every request resolves to the
    /// degraded path without any provider I/O. Read once per request.
    #[serde(default = "default_true")]
    pub ai_enabled: bool,

    /// Per-caller, per-task requests allowed per minute.
    #[serde(default = "default_caller_rpm")]
    pub caller_requests_per_minute: u32,

    /// Global requests allowed per day.
    #[serde(default = "default_global_rpd")]
    pub global_requests_per_day: u32,

    /// Per-caller daily spend ceiling in cents.
    #[serde(default = "default_caller_budget")]
    pub caller_daily_budget_cents: u32,

    /// Global daily spend ceiling in cents.
    #[serde(default = "default_global_budget")]
    pub global_daily_budget_cents: u32,

    /// Timeout for one attempt in the Immediate strategy, milliseconds.
    #[serde(default = "default_immediate_timeout_ms")]
    pub immediate_timeout_ms: u64,

    /// Timeout for one attempt in the Delayed strategy, milliseconds.
    #[serde(default = "default_delayed_timeout_ms")]
    pub delayed_timeout_ms: u64,

    /// Timeout for the single Simplified attempt, milliseconds.
    #[serde(default = "default_simplified_timeout_ms")]
    pub simplified_timeout_ms: u64,

    /// Backoff retries per provider in the Delayed strategy.
    #[serde(default = "default_delayed_retries")]
    pub delayed_retries: u32,

    /// Base backoff before the first Delayed retry, milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Wall-clock slice reserved so graceful degradation is always
    /// reachable before the deadline, milliseconds.
    #[serde(default = "default_degraded_reserve_ms")]
    pub degraded_reserve_ms: u64,

    /// Models that may be routed to. Empty means all models are allowed.
    #[serde(default)]
    pub model_allowlist: Vec<String>,

    /// Per-provider additive score overrides, used as tie-breaker priority.
    #[serde(default)]
    pub provider_weight_overrides: HashMap<String, f64>,

    /// Scoring weights for provider ranking.
    #[serde(default)]
    pub scoring: ScoringWeights,

    /// Response cache TTL in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Descriptor staleness TTL: registry entries not refreshed within
    /// this window are treated as unavailable.
    #[serde(default = "default_descriptor_ttl_secs")]
    pub descriptor_ttl_secs: u64,

    /// Trace retention window in seconds.
    #[serde(default = "default_trace_retention_secs")]
    pub trace_retention_secs: u64,

    /// Divisor applied to the token budget by the Simplified strategy.
    #[serde(default = "default_simplified_divisor")]
    pub simplified_budget_divisor: u32,

    /// Per-task token budgets.
    #[serde(default)]
    pub token_budgets: TokenBudgets,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: 0,
            ai_enabled: true,
            caller_requests_per_minute: default_caller_rpm(),
            global_requests_per_day: default_global_rpd(),
            caller_daily_budget_cents: default_caller_budget(),
            global_daily_budget_cents: default_global_budget(),
            immediate_timeout_ms: default_immediate_timeout_ms(),
            delayed_timeout_ms: default_delayed_timeout_ms(),
            simplified_timeout_ms: default_simplified_timeout_ms(),
            delayed_retries: default_delayed_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            degraded_reserve_ms: default_degraded_reserve_ms(),
            model_allowlist: Vec::new(),
            provider_weight_overrides: HashMap::new(),
            scoring: ScoringWeights::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            descriptor_ttl_secs: default_descriptor_ttl_secs(),
            trace_retention_secs: default_trace_retention_secs(),
            simplified_budget_divisor: default_simplified_divisor(),
            token_budgets: TokenBudgets::default(),
        }
    }
}

impl PolicyConfig {
    /// The per-caller, per-task rate window.
    pub fn caller_window(&self) -> WindowLimit {
        WindowLimit::per_minute(self.caller_requests_per_minute)
    }

    /// The global daily rate window.
    pub fn global_window(&self) -> WindowLimit {
        WindowLimit::per_day(self.global_requests_per_day)
    }

    /// Daily budget limits.
    pub fn budget_limits(&self) -> BudgetLimits {
        BudgetLimits {
            caller_daily_cents: self.caller_daily_budget_cents,
            global_daily_cents: self.global_daily_budget_cents,
        }
    }

    /// Timeout for one Immediate attempt.
    pub fn immediate_timeout(&self) -> Duration {
        Duration::from_millis(self.immediate_timeout_ms)
    }

    /// Timeout for one Delayed attempt.
    pub fn delayed_timeout(&self) -> Duration {
        Duration::from_millis(self.delayed_timeout_ms)
    }

    /// Timeout for the Simplified attempt.
    pub fn simplified_timeout(&self) -> Duration {
        Duration::from_millis(self.simplified_timeout_ms)
    }

    /// Reserved slice for graceful degradation.
    pub fn degraded_reserve(&self) -> Duration {
        Duration::from_millis(self.degraded_reserve_ms)
    }

    /// Whether a model may be routed to under this snapshot.
    pub fn model_allowed(&self, model: &str) -> bool {
        self.model_allowlist.is_empty() || self.model_allowlist.iter().any(|m| m == model)
    }

    /// Additive score override for a provider (tie-breaker priority).
    pub fn weight_override(&self, provider_id: &str) -> f64 {
        self.provider_weight_overrides
            .get(provider_id)
            .copied()
            .unwrap_or(0.0)
    }

    /// Validates the snapshot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.immediate_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("immediate_timeout_ms"));
        }
        if self.delayed_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("delayed_timeout_ms"));
        }
        if self.simplified_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("simplified_timeout_ms"));
        }
        if self.cache_ttl_secs == 0 {
            return Err(ValidationError::InvalidCacheTtl);
        }
        for (name, value) in [
            ("cost", self.scoring.cost),
            ("success_rate", self.scoring.success_rate),
            ("latency", self.scoring.latency),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidWeight { name, value });
            }
        }
        let min = self.token_budgets.min_required;
        for task_type in TaskType::all() {
            if self.token_budgets.budget_for(task_type) < min {
                return Err(ValidationError::TokenBudgetTooSmall {
                    task: task_type.as_str(),
                    min,
                });
            }
        }
        Ok(())
    }
}

/// Holder of the active policy snapshot, hot-swappable without restart.
#[derive(Debug)]
pub struct PolicyStore {
    active: RwLock<Arc<PolicyConfig>>,
}

impl PolicyStore {
    /// Creates a store with an initial snapshot.
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            active: RwLock::new(Arc::new(config)),
        }
    }

    /// The active snapshot. Requests call this exactly once, at start.
    pub async fn current(&self) -> Arc<PolicyConfig> {
        self.active.read().await.clone()
    }

    /// Installs a new snapshot for subsequent requests.
    ///
    /// An invalid snapshot is rejected and the previous one stays active
    /// (fail closed).
    pub async fn install(&self, config: PolicyConfig) -> Result<(), ValidationError> {
        config.validate()?;
        let version = config.version;
        *self.active.write().await = Arc::new(config);
        tracing::info!(version, "policy snapshot installed");
        Ok(())
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

fn default_true() -> bool {
    true
}

fn default_caller_rpm() -> u32 {
    60
}

fn default_global_rpd() -> u32 {
    50_000
}

fn default_caller_budget() -> u32 {
    2_000
}

fn default_global_budget() -> u32 {
    50_000
}

fn default_immediate_timeout_ms() -> u64 {
    2_000
}

fn default_delayed_timeout_ms() -> u64 {
    4_000
}

fn default_simplified_timeout_ms() -> u64 {
    2_000
}

fn default_delayed_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_degraded_reserve_ms() -> u64 {
    50
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_descriptor_ttl_secs() -> u64 {
    120
}

fn default_trace_retention_secs() -> u64 {
    3_600
}

fn default_simplified_divisor() -> u32 {
    2
}

fn default_search_budget() -> u32 {
    512
}

fn default_classification_budget() -> u32 {
    256
}

fn default_suggestion_budget() -> u32 {
    512
}

fn default_min_required_tokens() -> u32 {
    16
}

fn default_cost_weight() -> f64 {
    0.3
}

fn default_success_weight() -> f64 {
    0.5
}

fn default_latency_weight() -> f64 {
    0.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PolicyConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let config = PolicyConfig {
            immediate_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_weight_fails_validation() {
        let mut config = PolicyConfig::default();
        config.scoring.cost = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_budget_below_minimum_fails_validation() {
        let mut config = PolicyConfig::default();
        config.token_budgets.classification = 4;
        config.token_budgets.min_required = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_allowlist_allows_all_models() {
        let config = PolicyConfig::default();
        assert!(config.model_allowed("gpt-4o"));
        assert!(config.model_allowed("anything"));
    }

    #[test]
    fn non_empty_allowlist_is_exclusive() {
        let config = PolicyConfig {
            model_allowlist: vec!["gpt-4o".to_string()],
            ..Default::default()
        };
        assert!(config.model_allowed("gpt-4o"));
        assert!(!config.model_allowed("claude-3"));
    }

    #[test]
    fn weight_override_defaults_to_zero() {
        let mut config = PolicyConfig::default();
        config
            .provider_weight_overrides
            .insert("local-rules".to_string(), 0.5);
        assert_eq!(config.weight_override("local-rules"), 0.5);
        assert_eq!(config.weight_override("unknown"), 0.0);
    }

    #[tokio::test]
    async fn store_swaps_snapshot_for_next_reader() {
        let store = PolicyStore::default();
        let before = store.current().await;
        assert_eq!(before.version, 0);

        let next = PolicyConfig {
            version: 7,
            ..Default::default()
        };
        store.install(next).await.unwrap();

        // The earlier snapshot is untouched; new readers see version 7.
        assert_eq!(before.version, 0);
        assert_eq!(store.current().await.version, 7);
    }

    #[tokio::test]
    async fn store_rejects_invalid_snapshot_and_keeps_previous() {
        let store = PolicyStore::default();
        let invalid = PolicyConfig {
            version: 9,
            cache_ttl_secs: 0,
            ..Default::default()
        };
        assert!(store.install(invalid).await.is_err());
        assert_eq!(store.current().await.version, 0);
    }
}
