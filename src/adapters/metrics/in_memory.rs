//! In-memory rolling-window metrics collector.
//!
//! Keeps a bounded window of recent samples per provider and derives the
//! success rate and p95 latency the policy engine ranks on. Samples age out
//! by time and by count, so a provider that misbehaved an hour ago is not
//! punished forever.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;

use crate::domain::foundation::{ProviderId, Timestamp};
use crate::ports::{
    AttemptOutcome, ExportFormat, HealthSignal, MetricSample, MetricsCollector,
    ProviderHealthReport, ProviderStats,
};

/// How long a sample stays in the rolling window.
const WINDOW_SECS: u64 = 300;
/// Hard cap on retained samples per provider.
const MAX_SAMPLES: usize = 1_000;
/// Below this many samples the health judgement stays optimistic.
const MIN_SAMPLES_FOR_JUDGEMENT: usize = 5;

#[derive(Debug, Clone)]
struct StoredSample {
    recorded_at: Timestamp,
    outcome: AttemptOutcome,
    latency_ms: u64,
    cost_cents: u32,
}

/// Process-local metrics aggregation.
#[derive(Default)]
pub struct InMemoryMetricsCollector {
    samples: DashMap<ProviderId, VecDeque<StoredSample>>,
}

impl InMemoryMetricsCollector {
    /// Creates a collector with no samples.
    pub fn new() -> Self {
        Self::default()
    }

    fn evict(window: &mut VecDeque<StoredSample>, now: Timestamp) {
        while let Some(front) = window.front() {
            let aged_out = now.duration_since(&front.recorded_at).num_seconds()
                > WINDOW_SECS as i64;
            if aged_out || window.len() > MAX_SAMPLES {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    fn stats_of(window: &VecDeque<StoredSample>) -> Option<ProviderStats> {
        if window.is_empty() {
            return None;
        }
        let successes = window
            .iter()
            .filter(|s| s.outcome.is_success())
            .count();
        let mut latencies: Vec<u64> = window.iter().map(|s| s.latency_ms).collect();
        latencies.sort_unstable();
        let p95_index = ((latencies.len() as f64) * 0.95).ceil() as usize;
        let p95_latency_ms = latencies[p95_index.saturating_sub(1).min(latencies.len() - 1)];
        Some(ProviderStats {
            success_rate: successes as f64 / window.len() as f64,
            p95_latency_ms,
            sample_count: window.len(),
            total_cost_cents: window.iter().map(|s| u64::from(s.cost_cents)).sum(),
        })
    }

    fn judge(stats: &ProviderStats) -> (HealthSignal, String) {
        if stats.sample_count < MIN_SAMPLES_FOR_JUDGEMENT {
            return (
                HealthSignal::Healthy,
                "insufficient samples, assuming healthy".to_string(),
            );
        }
        if stats.success_rate >= 0.9 {
            (HealthSignal::Healthy, "operating normally".to_string())
        } else if stats.success_rate >= 0.5 {
            (
                HealthSignal::Degraded,
                format!(
                    "elevated failure rate ({:.0}%), deprioritized in routing",
                    (1.0 - stats.success_rate) * 100.0
                ),
            )
        } else {
            (
                HealthSignal::Critical,
                format!(
                    "failing {:.0}% of attempts, excluded from routing",
                    (1.0 - stats.success_rate) * 100.0
                ),
            )
        }
    }
}

#[async_trait]
impl MetricsCollector for InMemoryMetricsCollector {
    async fn record(&self, sample: MetricSample) {
        let now = Timestamp::now();
        let mut window = self.samples.entry(sample.provider.clone()).or_default();
        window.push_back(StoredSample {
            recorded_at: now,
            outcome: sample.outcome,
            latency_ms: sample.latency_ms,
            cost_cents: sample.cost_cents,
        });
        Self::evict(&mut window, now);
    }

    async fn provider_stats(&self, provider: &ProviderId) -> Option<ProviderStats> {
        let now = Timestamp::now();
        let mut window = self.samples.get_mut(provider)?;
        Self::evict(&mut window, now);
        Self::stats_of(&window)
    }

    async fn health_status(&self) -> Vec<ProviderHealthReport> {
        let now = Timestamp::now();
        let mut reports = Vec::new();
        for mut entry in self.samples.iter_mut() {
            let provider = entry.key().clone();
            Self::evict(entry.value_mut(), now);
            if let Some(stats) = Self::stats_of(entry.value()) {
                let (signal, recommendation) = Self::judge(&stats);
                reports.push(ProviderHealthReport {
                    provider,
                    signal,
                    stats,
                    recommendation,
                });
            }
        }
        reports.sort_by(|a, b| a.provider.as_str().cmp(b.provider.as_str()));
        reports
    }

    async fn export(&self, format: ExportFormat) -> String {
        let reports = self.health_status().await;
        match format {
            ExportFormat::Json => {
                let doc: serde_json::Map<String, serde_json::Value> = reports
                    .iter()
                    .map(|r| {
                        (
                            r.provider.as_str().to_string(),
                            serde_json::json!({
                                "signal": r.signal,
                                "success_rate": r.stats.success_rate,
                                "p95_latency_ms": r.stats.p95_latency_ms,
                                "sample_count": r.stats.sample_count,
                                "total_cost_cents": r.stats.total_cost_cents,
                            }),
                        )
                    })
                    .collect();
                serde_json::Value::Object(doc).to_string()
            }
            ExportFormat::Prometheus => {
                let mut out = String::new();
                out.push_str("# TYPE ai_provider_success_rate gauge\n");
                for r in &reports {
                    out.push_str(&format!(
                        "ai_provider_success_rate{{provider=\"{}\"}} {}\n",
                        r.provider, r.stats.success_rate
                    ));
                }
                out.push_str("# TYPE ai_provider_p95_latency_ms gauge\n");
                for r in &reports {
                    out.push_str(&format!(
                        "ai_provider_p95_latency_ms{{provider=\"{}\"}} {}\n",
                        r.provider, r.stats.p95_latency_ms
                    ));
                }
                out.push_str("# TYPE ai_provider_cost_cents_total counter\n");
                for r in &reports {
                    out.push_str(&format!(
                        "ai_provider_cost_cents_total{{provider=\"{}\"}} {}\n",
                        r.provider, r.stats.total_cost_cents
                    ));
                }
                out
            }
        }
    }
}
