//! Fallback manager - the resilience chain between ranking and response.
//!
//! Walks a fixed strategy ladder under one shared deadline:
//! cache, immediate, delayed (backoff retries of the top providers),
//! simplified (one retry with a shrunken context), degraded. Every provider
//! failure is absorbed here; the chain always produces a result. A slice of
//! the deadline is reserved up front so the degraded step is reachable even
//! when every attempt runs long.

use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::normalizer::Normalizer;
use crate::application::policy_engine::RankedProvider;
use crate::config::PolicyConfig;
use crate::domain::foundation::{ProviderId, SpanId, TraceId};
use crate::domain::{
    Deadline, FallbackLevel, ProviderClass, SanitizedContext, TaskResult, TaskType,
};
use crate::ports::{
    AttemptOutcome, CacheEntry, CacheKey, MetricSample, MetricsCollector, ProviderAdapter,
    ProviderCallConfig, ProviderError, ResponseCache, SpanAttribute, Tracer,
};

/// One ranked provider paired with its adapter, ready to call.
pub struct Candidate {
    /// Ranking entry produced by the policy engine.
    pub ranked: RankedProvider,
    /// The adapter to execute against.
    pub adapter: Arc<dyn ProviderAdapter>,
}

/// What the fallback chain produced.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    /// The canonical result.
    pub result: TaskResult,
    /// Strategy that produced it.
    pub level: FallbackLevel,
    /// Provider that answered, if a live call succeeded.
    pub provider: Option<ProviderId>,
    /// Tokens consumed by the producing call.
    pub tokens_used: u32,
    /// Cost of the producing call in cents.
    pub cost_cents: u32,
}

struct AttemptSuccess {
    result: TaskResult,
    provider: ProviderId,
    class: ProviderClass,
    tokens: u32,
    cost_cents: u32,
}

/// Executes the fallback strategy ladder.
pub struct FallbackManager {
    cache: Arc<dyn ResponseCache>,
    metrics: Arc<dyn MetricsCollector>,
    tracer: Arc<dyn Tracer>,
}

impl FallbackManager {
    /// Creates a manager over the given stores.
    pub fn new(
        cache: Arc<dyn ResponseCache>,
        metrics: Arc<dyn MetricsCollector>,
        tracer: Arc<dyn Tracer>,
    ) -> Self {
        Self {
            cache,
            metrics,
            tracer,
        }
    }

    /// Resolves a request to a result, never failing.
    ///
    /// `simplified_context` is the pre-shrunk context for the simplified
    /// strategy; when `None` that rung is skipped.
    #[allow(clippy::too_many_arguments)]
    pub async fn resolve(
        &self,
        policy: &PolicyConfig,
        context: &SanitizedContext,
        simplified_context: Option<&SanitizedContext>,
        candidates: &[Candidate],
        deadline: Deadline,
        trace_id: TraceId,
        parent_span: Option<SpanId>,
    ) -> FallbackOutcome {
        let task_type = context.task_type();

        // Cache: one lookup per distinct provider class, in rank order.
        for class in distinct_classes(candidates) {
            let key = CacheKey::compute(task_type, context, class);
            if let Some(entry) = self.cache.get(&key).await {
                let span = self.open_span(trace_id, parent_span, "fallback.cache");
                self.close_span(
                    span,
                    vec![
                        SpanAttribute::new("strategy", FallbackLevel::Cache.as_str()),
                        SpanAttribute::new("provider_class", class.as_str()),
                        SpanAttribute::new("outcome", "hit"),
                    ],
                );
                return FallbackOutcome {
                    result: entry.result,
                    level: FallbackLevel::Cache,
                    provider: None,
                    tokens_used: 0,
                    cost_cents: 0,
                };
            }
        }

        let mut transient_failures: HashSet<ProviderId> = HashSet::new();
        let mut saw_rejection = false;

        // Immediate: one pass over the ranked list.
        for candidate in candidates {
            let usable = Self::usable(deadline, policy);
            if usable.is_zero() {
                break;
            }
            if !candidate.adapter.is_available() {
                continue;
            }
            let timeout = policy.immediate_timeout().min(usable);
            match self
                .attempt(policy, candidate, context, timeout, "immediate", trace_id, parent_span)
                .await
            {
                Ok(success) => {
                    return self
                        .finish(policy, task_type, context, success, FallbackLevel::Immediate)
                        .await;
                }
                Err(err) if err.is_transient() => {
                    transient_failures.insert(candidate.ranked.id.clone());
                }
                Err(_) => saw_rejection = true,
            }
        }

        // Delayed: backoff retries against the top two transient failures.
        let retry_pool: Vec<&Candidate> = candidates
            .iter()
            .take(2)
            .filter(|c| transient_failures.contains(&c.ranked.id))
            .collect();
        'delayed: for round in 0..policy.delayed_retries {
            let backoff = backoff_with_jitter(policy.backoff_base_ms, round);
            for &candidate in &retry_pool {
                if Self::usable(deadline, policy) <= backoff {
                    break 'delayed;
                }
                tokio::time::sleep(backoff).await;
                let usable = Self::usable(deadline, policy);
                if usable.is_zero() {
                    break 'delayed;
                }
                let timeout = policy.delayed_timeout().min(usable);
                match self
                    .attempt(policy, candidate, context, timeout, "delayed", trace_id, parent_span)
                    .await
                {
                    Ok(success) => {
                        return self
                            .finish(policy, task_type, context, success, FallbackLevel::Delayed)
                            .await;
                    }
                    Err(err) if err.is_payload_rejection() => saw_rejection = true,
                    Err(_) => {}
                }
            }
        }

        // Simplified: a single attempt with the shrunken context against the
        // best candidate, only when a provider rejected the payload.
        if saw_rejection {
            if let (Some(simplified), Some(candidate)) = (simplified_context, candidates.first()) {
                let usable = Self::usable(deadline, policy);
                if !usable.is_zero() && candidate.adapter.is_available() {
                    let timeout = policy.simplified_timeout().min(usable);
                    if let Ok(success) = self
                        .attempt(
                            policy, candidate, simplified, timeout, "simplified", trace_id,
                            parent_span,
                        )
                        .await
                    {
                        // Cached under the original key so an identical
                        // repeat request hits without re-shrinking.
                        return self
                            .finish(policy, task_type, context, success, FallbackLevel::Simplified)
                            .await;
                    }
                }
            }
        }

        // Degraded: stale cache if present, else the empty shape. Local
        // work only, so it cannot fail and needs no deadline headroom.
        let span = self.open_span(trace_id, parent_span, "fallback.degraded");
        for class in distinct_classes(candidates) {
            let key = CacheKey::compute(task_type, context, class);
            if let Some(entry) = self.cache.get_stale(&key).await {
                self.close_span(
                    span,
                    vec![
                        SpanAttribute::new("strategy", FallbackLevel::Degraded.as_str()),
                        SpanAttribute::new("outcome", "stale_cache"),
                    ],
                );
                return FallbackOutcome {
                    result: entry.result,
                    level: FallbackLevel::Degraded,
                    provider: None,
                    tokens_used: 0,
                    cost_cents: 0,
                };
            }
        }
        self.close_span(
            span,
            vec![
                SpanAttribute::new("strategy", FallbackLevel::Degraded.as_str()),
                SpanAttribute::new("outcome", "empty_shape"),
            ],
        );
        FallbackOutcome {
            result: TaskResult::empty_for(task_type),
            level: FallbackLevel::Degraded,
            provider: None,
            tokens_used: 0,
            cost_cents: 0,
        }
    }

    /// Deadline headroom minus the reserved degraded slice.
    fn usable(deadline: Deadline, policy: &PolicyConfig) -> Duration {
        deadline.remaining().saturating_sub(policy.degraded_reserve())
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        policy: &PolicyConfig,
        candidate: &Candidate,
        context: &SanitizedContext,
        timeout: Duration,
        strategy: &str,
        trace_id: TraceId,
        parent_span: Option<SpanId>,
    ) -> Result<AttemptSuccess, ProviderError> {
        let task_type = context.task_type();
        let span = self.open_span(trace_id, parent_span, "provider.call");
        let config = ProviderCallConfig::new(timeout, policy.token_budgets.budget_for(task_type));

        let started = Instant::now();
        let outcome = match tokio::time::timeout(
            timeout,
            candidate.adapter.execute_task(task_type, context, &config),
        )
        .await
        {
            Err(_) => Err(ProviderError::timeout(started.elapsed().as_millis() as u64)),
            Ok(Err(err)) => Err(err),
            Ok(Ok(raw)) => Normalizer::normalize(task_type, &raw.body).map(|result| {
                AttemptSuccess {
                    result,
                    provider: candidate.ranked.id.clone(),
                    class: candidate.ranked.class,
                    tokens: raw.tokens_used,
                    cost_cents: raw.cost_cents,
                }
            }),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let metric_outcome = match &outcome {
            Ok(_) => AttemptOutcome::Success,
            Err(ProviderError::Timeout { .. }) => AttemptOutcome::Timeout,
            Err(ProviderError::Provider { .. }) => AttemptOutcome::Error,
            Err(ProviderError::Validation { .. }) => AttemptOutcome::ValidationFailed,
        };
        let (tokens, cost_cents) = match &outcome {
            Ok(success) => (success.tokens, success.cost_cents),
            Err(_) => (0, 0),
        };
        self.metrics
            .record(MetricSample {
                provider: candidate.ranked.id.clone(),
                task_type,
                outcome: metric_outcome,
                latency_ms,
                tokens,
                cost_cents,
            })
            .await;

        self.close_span(
            span,
            vec![
                SpanAttribute::new("provider", candidate.ranked.id.as_str()),
                SpanAttribute::new("strategy", strategy),
                SpanAttribute::new("outcome", metric_outcome.as_str()),
                SpanAttribute::new("latency_ms", latency_ms.to_string()),
            ],
        );
        outcome
    }

    /// Writes the success through the cache and shapes the outcome.
    async fn finish(
        &self,
        policy: &PolicyConfig,
        task_type: TaskType,
        context: &SanitizedContext,
        success: AttemptSuccess,
        level: FallbackLevel,
    ) -> FallbackOutcome {
        let key = CacheKey::compute(task_type, context, success.class);
        self.cache
            .put(key, CacheEntry::new(success.result.clone(), policy.cache_ttl_secs))
            .await;
        FallbackOutcome {
            result: success.result,
            level,
            provider: Some(success.provider),
            tokens_used: success.tokens,
            cost_cents: success.cost_cents,
        }
    }

    fn open_span(
        &self,
        trace_id: TraceId,
        parent: Option<SpanId>,
        name: &str,
    ) -> Option<SpanId> {
        match self.tracer.start_span(trace_id, parent, name) {
            Ok(span) => Some(span),
            Err(err) => {
                tracing::debug!(error = %err, name, "span open failed");
                None
            }
        }
    }

    fn close_span(&self, span: Option<SpanId>, attributes: Vec<SpanAttribute>) {
        if let Some(span_id) = span {
            if let Err(err) = self.tracer.end_span(span_id, attributes) {
                tracing::debug!(error = %err, "span close failed");
            }
        }
    }
}

fn distinct_classes(candidates: &[Candidate]) -> Vec<ProviderClass> {
    let mut classes = Vec::new();
    for candidate in candidates {
        if !classes.contains(&candidate.ranked.class) {
            classes.push(candidate.ranked.class);
        }
    }
    classes
}

fn backoff_with_jitter(base_ms: u64, round: u32) -> Duration {
    let base = base_ms.saturating_mul(1u64 << round.min(16));
    let jitter = if base_ms > 1 {
        rand::thread_rng().gen_range(0..base_ms / 2 + 1)
    } else {
        0
    };
    Duration::from_millis(base + jitter)
}
