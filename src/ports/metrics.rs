//! Metrics collector port.
//!
//! Aggregates per-provider outcome/latency/cost samples into rolling windows
//! that feed policy-engine scoring, and exposes health reporting and export
//! for external consumption.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ProviderId;
use crate::domain::TaskType;

/// Outcome of a single provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Attempt returned a valid, normalizable response.
    Success,
    /// Attempt exceeded its timeout.
    Timeout,
    /// Backend-side failure.
    Error,
    /// Provider rejected the payload or its response failed normalization.
    ValidationFailed,
}

impl AttemptOutcome {
    /// Returns true for successful attempts.
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }

    /// Returns the string representation used in export labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::Error => "error",
            AttemptOutcome::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    /// Provider that was attempted.
    pub provider: ProviderId,
    /// Task category.
    pub task_type: TaskType,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Wall-clock latency of the attempt in milliseconds.
    pub latency_ms: u64,
    /// Tokens consumed (zero for failures).
    pub tokens: u32,
    /// Cost in cents (zero for failures).
    pub cost_cents: u32,
}

/// Rolling statistics for one provider, derived from the current window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Success rate in [0, 1] over the window.
    pub success_rate: f64,
    /// p95 latency in milliseconds over the window.
    pub p95_latency_ms: u64,
    /// Number of samples in the window.
    pub sample_count: usize,
    /// Total cost in cents over the window.
    pub total_cost_cents: u64,
}

/// Health signal derived from rolling stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthSignal {
    Healthy,
    Degraded,
    Critical,
}

/// Per-provider health report with a human-readable recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthReport {
    /// Provider being reported on.
    pub provider: ProviderId,
    /// Current signal.
    pub signal: HealthSignal,
    /// Rolling stats backing the signal.
    pub stats: ProviderStats,
    /// Operator-facing recommendation.
    pub recommendation: String,
}

/// Supported export formats for current aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// JSON document of all provider stats.
    Json,
    /// Prometheus text exposition format.
    Prometheus,
}

/// Port for recording and querying orchestration metrics.
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    /// Records one provider attempt.
    async fn record(&self, sample: MetricSample);

    /// Rolling stats for one provider, if it has samples in the window.
    async fn provider_stats(&self, provider: &ProviderId) -> Option<ProviderStats>;

    /// Health reports for every provider with samples.
    async fn health_status(&self) -> Vec<ProviderHealthReport>;

    /// Serializes current aggregates for external consumption.
    async fn export(&self, format: ExportFormat) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_classification() {
        assert!(AttemptOutcome::Success.is_success());
        assert!(!AttemptOutcome::Timeout.is_success());
        assert!(!AttemptOutcome::Error.is_success());
        assert!(!AttemptOutcome::ValidationFailed.is_success());
    }

    #[test]
    fn outcome_as_str_is_stable() {
        assert_eq!(AttemptOutcome::Success.as_str(), "success");
        assert_eq!(AttemptOutcome::ValidationFailed.as_str(), "validation_failed");
    }

    #[test]
    fn health_signal_serializes_snake_case() {
        let json = serde_json::to_string(&HealthSignal::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
