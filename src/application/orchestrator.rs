//! Orchestrator - the single entry point for AI task execution.
//!
//! One `execute` call runs the whole pipeline: input validation, policy
//! snapshot capture, tracing, rate and budget gates (checked before any
//! provider I/O), context sanitization, provider ranking and the fallback
//! chain. The only errors a caller ever sees are its own invalid input and
//! policy rejections; every provider-side failure resolves into a degraded
//! response instead.

use std::sync::Arc;

use crate::adapters::ai::ProviderRegistry;
use crate::application::context_builder::ContextBuilder;
use crate::application::fallback::{Candidate, FallbackManager, FallbackOutcome};
use crate::application::policy_engine::PolicyEngine;
use crate::config::{PolicyConfig, PolicyStore};
use crate::domain::foundation::{OrchestratorError, SpanId, Timestamp, TraceId};
use crate::domain::{
    AIResponse, CallerContext, Deadline, FallbackLevel, Priority, ResponseMetadata, TaskRequest,
    TaskType,
};
use crate::ports::{
    BudgetDecision, BudgetTracker, MetricsCollector, RateLimitKey, RateLimitResult, RateLimiter,
    ResponseCache, SpanAttribute, SpendRecord, Tracer,
};

/// Coordinates every component behind one façade.
pub struct Orchestrator {
    policy_store: Arc<PolicyStore>,
    context_builder: Arc<ContextBuilder>,
    registry: Arc<ProviderRegistry>,
    cache: Arc<dyn ResponseCache>,
    rate_limiter: Arc<dyn RateLimiter>,
    budget: Arc<dyn BudgetTracker>,
    metrics: Arc<dyn MetricsCollector>,
    tracer: Arc<dyn Tracer>,
    fallback: FallbackManager,
}

impl Orchestrator {
    /// Wires an orchestrator over the given stores and registry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy_store: Arc<PolicyStore>,
        context_builder: Arc<ContextBuilder>,
        registry: Arc<ProviderRegistry>,
        cache: Arc<dyn ResponseCache>,
        rate_limiter: Arc<dyn RateLimiter>,
        budget: Arc<dyn BudgetTracker>,
        metrics: Arc<dyn MetricsCollector>,
        tracer: Arc<dyn Tracer>,
    ) -> Self {
        let fallback = FallbackManager::new(cache.clone(), metrics.clone(), tracer.clone());
        Self {
            policy_store,
            context_builder,
            registry,
            cache,
            rate_limiter,
            budget,
            metrics,
            tracer,
            fallback,
        }
    }

    /// Executes one AI task end to end.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `ContextTooLarge`, `RateLimitExceeded` and
    /// `BudgetExceeded` are the only failures; all of them are decided
    /// before any provider is called.
    pub async fn execute(
        &self,
        task_type: TaskType,
        payload: impl Into<String>,
        caller: CallerContext,
        priority: Priority,
        deadline: Deadline,
    ) -> Result<AIResponse, OrchestratorError> {
        let request = TaskRequest::new(task_type, payload, caller, priority, deadline)?;
        let policy = self.policy_store.current().await;

        let trace_id = self.tracer.start_trace();
        let root = self.open_root(trace_id);

        if !policy.ai_enabled {
            tracing::info!(trace_id = %trace_id, "ai disabled by policy, serving degraded");
            self.close_root(root, vec![SpanAttribute::new("outcome", "ai_disabled")]);
            return Ok(AIResponse::degraded(task_type, trace_id));
        }

        if let Err(err) = self.check_rate_limits(&request, &policy).await {
            self.close_root(root, vec![SpanAttribute::new("outcome", "rate_limited")]);
            return Err(err);
        }

        let budgets = &policy.token_budgets;
        let context = match self.context_builder.build(
            task_type,
            &request.payload,
            budgets.budget_for(task_type),
            budgets.min_required,
        ) {
            Ok(context) => context,
            Err(err) => {
                self.close_root(root, vec![SpanAttribute::new("outcome", "context_rejected")]);
                return Err(err);
            }
        };

        let descriptors = self.registry.descriptors();
        let ranked = PolicyEngine::rank(&policy, task_type, &descriptors, Timestamp::now());
        let candidates: Vec<Candidate> = ranked
            .into_iter()
            .filter_map(|entry| {
                self.registry
                    .adapter(&entry.id)
                    .map(|adapter| Candidate {
                        ranked: entry,
                        adapter,
                    })
            })
            .collect();

        let estimated_cents = candidates
            .first()
            .map(|c| c.adapter.estimated_cost(&context))
            .unwrap_or(0);
        match self
            .budget
            .reserve(&request.caller.caller_id, estimated_cents, policy.budget_limits())
            .await
        {
            BudgetDecision::Allowed { .. } => {}
            BudgetDecision::Denied {
                spent_cents,
                limit_cents,
            } => {
                self.close_root(root, vec![SpanAttribute::new("outcome", "budget_exceeded")]);
                return Err(OrchestratorError::BudgetExceeded {
                    spent_cents,
                    limit_cents,
                });
            }
        }

        let simplified = self.simplified_context(&policy, &request, task_type);
        let outcome = self
            .fallback
            .resolve(
                &policy,
                &context,
                simplified.as_ref(),
                &candidates,
                deadline,
                trace_id,
                root,
            )
            .await;

        self.budget
            .record(
                SpendRecord::new(
                    request.caller.caller_id.clone(),
                    task_type,
                    outcome.cost_cents,
                    outcome.tokens_used,
                ),
                estimated_cents,
            )
            .await;

        tracing::info!(
            request_id = %request.id,
            trace_id = %trace_id,
            task = %task_type,
            caller = %request.caller.caller_id,
            level = %outcome.level,
            "request resolved"
        );
        self.close_root(
            root,
            vec![
                SpanAttribute::new("request_id", request.id.to_string()),
                SpanAttribute::new("outcome", "resolved"),
                SpanAttribute::new("fallback_level", outcome.level.as_str()),
                SpanAttribute::new("redactions", context.redactions_applied().to_string()),
                SpanAttribute::sensitive("prompt", context.prompt()),
            ],
        );
        Ok(self.shape_response(trace_id, outcome))
    }

    /// Opportunistic housekeeping: expired cache entries, old traces and
    /// descriptor refresh. Intended to run on a timer.
    pub async fn run_maintenance(&self) {
        let policy = self.policy_store.current().await;
        self.cache.purge_expired().await;
        self.tracer.prune(policy.trace_retention_secs);
        self.registry.refresh_from_metrics(self.metrics.as_ref()).await;
    }

    async fn check_rate_limits(
        &self,
        request: &TaskRequest,
        policy: &PolicyConfig,
    ) -> Result<(), OrchestratorError> {
        let caller_key = RateLimitKey::caller_task(
            request.caller.caller_id.clone(),
            request.task_type,
        );
        if let RateLimitResult::Denied(denied) = self
            .rate_limiter
            .check(caller_key, policy.caller_window())
            .await
        {
            return Err(OrchestratorError::RateLimitExceeded {
                retry_after_secs: denied.retry_after_secs,
            });
        }
        if let RateLimitResult::Denied(denied) = self
            .rate_limiter
            .check(RateLimitKey::GlobalDaily, policy.global_window())
            .await
        {
            return Err(OrchestratorError::RateLimitExceeded {
                retry_after_secs: denied.retry_after_secs,
            });
        }
        Ok(())
    }

    fn simplified_context(
        &self,
        policy: &PolicyConfig,
        request: &TaskRequest,
        task_type: TaskType,
    ) -> Option<crate::domain::SanitizedContext> {
        let divisor = policy.simplified_budget_divisor.max(1);
        let budgets = &policy.token_budgets;
        let shrunk = budgets.budget_for(task_type) / divisor;
        if shrunk < budgets.min_required {
            return None;
        }
        self.context_builder
            .build(task_type, &request.payload, shrunk, budgets.min_required)
            .ok()
    }

    fn shape_response(&self, trace_id: TraceId, outcome: FallbackOutcome) -> AIResponse {
        let is_degraded = outcome.level == FallbackLevel::Degraded;
        AIResponse::new(
            outcome.result,
            ResponseMetadata {
                provider_used: outcome.provider,
                fallback_level: outcome.level,
                is_degraded,
                tokens_used: outcome.tokens_used,
                cost_estimate_cents: outcome.cost_cents,
                trace_id,
            },
        )
    }

    fn open_root(&self, trace_id: TraceId) -> Option<SpanId> {
        match self.tracer.start_span(trace_id, None, "orchestrate") {
            Ok(span) => Some(span),
            Err(err) => {
                tracing::debug!(error = %err, "root span open failed");
                None
            }
        }
    }

    fn close_root(&self, span: Option<SpanId>, attributes: Vec<SpanAttribute>) {
        if let Some(span_id) = span {
            if let Err(err) = self.tracer.end_span(span_id, attributes) {
                tracing::debug!(error = %err, "root span close failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockProvider;
    use crate::adapters::budget::InMemoryBudgetTracker;
    use crate::adapters::cache::InMemoryResponseCache;
    use crate::adapters::metrics::InMemoryMetricsCollector;
    use crate::adapters::rate_limiter::InMemoryRateLimiter;
    use crate::adapters::trace::InMemoryTracer;
    use crate::config::RedactionConfig;
    use crate::domain::foundation::{CallerId, ProviderId};
    use crate::domain::{CallerTier, ProviderClass};
    use std::time::Duration;

    struct Harness {
        orchestrator: Orchestrator,
        tracer: Arc<InMemoryTracer>,
        provider: Arc<MockProvider>,
    }

    fn harness(policy: PolicyConfig) -> Harness {
        let tracer = Arc::new(InMemoryTracer::new());
        let provider = Arc::new(MockProvider::new(
            ProviderId::new("local-rules").unwrap(),
            ProviderClass::Local,
        ));
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(provider.clone());

        let orchestrator = Orchestrator::new(
            Arc::new(PolicyStore::new(policy)),
            Arc::new(ContextBuilder::new(&RedactionConfig::default()).unwrap()),
            registry,
            Arc::new(InMemoryResponseCache::new()),
            Arc::new(InMemoryRateLimiter::new()),
            Arc::new(InMemoryBudgetTracker::new()),
            Arc::new(InMemoryMetricsCollector::new()),
            tracer.clone(),
        );
        Harness {
            orchestrator,
            tracer,
            provider,
        }
    }

    fn caller() -> CallerContext {
        CallerContext::new(CallerId::new("parts-service").unwrap(), CallerTier::Standard)
    }

    fn deadline() -> Deadline {
        Deadline::from_now(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn execute_resolves_through_the_top_provider() {
        let h = harness(PolicyConfig::default());
        let response = h
            .orchestrator
            .execute(
                TaskType::Search,
                "brake pads for a 2018 Golf",
                caller(),
                Priority::Normal,
                deadline(),
            )
            .await
            .unwrap();

        assert_eq!(response.metadata.fallback_level, FallbackLevel::Immediate);
        assert_eq!(
            response.metadata.provider_used.as_ref().unwrap().as_str(),
            "local-rules"
        );
        assert!(!response.metadata.is_degraded);
    }

    #[tokio::test]
    async fn empty_payload_is_invalid_input() {
        let h = harness(PolicyConfig::default());
        let err = h
            .orchestrator
            .execute(TaskType::Search, "  ", caller(), Priority::Normal, deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn kill_switch_serves_degraded_without_provider_io() {
        let policy = PolicyConfig {
            ai_enabled: false,
            ..Default::default()
        };
        let h = harness(policy);
        let response = h
            .orchestrator
            .execute(
                TaskType::Suggestion,
                "customer asked about delivery",
                caller(),
                Priority::Normal,
                deadline(),
            )
            .await
            .unwrap();

        assert!(response.metadata.is_degraded);
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn rate_limit_fails_fast_before_provider_io() {
        let policy = PolicyConfig {
            caller_requests_per_minute: 1,
            ..Default::default()
        };
        let h = harness(policy);

        h.orchestrator
            .execute(TaskType::Search, "first", caller(), Priority::Normal, deadline())
            .await
            .unwrap();
        let err = h
            .orchestrator
            .execute(TaskType::Search, "second", caller(), Priority::Normal, deadline())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::RateLimitExceeded { .. }));
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_fails_fast_before_provider_io() {
        let policy = PolicyConfig {
            caller_daily_budget_cents: 10,
            ..Default::default()
        };
        let h = harness(policy);

        // The mock costs 1 cent per call by default; make it exceed the cap.
        let expensive = Arc::new(
            MockProvider::new(ProviderId::new("pricey").unwrap(), ProviderClass::Premium)
                .with_cost(50),
        );
        h.orchestrator.registry.register(expensive);
        h.orchestrator
            .registry
            .deregister(&ProviderId::new("local-rules").unwrap());

        let err = h
            .orchestrator
            .execute(TaskType::Search, "query", caller(), Priority::Normal, deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::BudgetExceeded { .. }));
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn successful_request_leaves_a_complete_trace() {
        let h = harness(PolicyConfig::default());
        let response = h
            .orchestrator
            .execute(
                TaskType::Classification,
                "where is my order?",
                caller(),
                Priority::High,
                deadline(),
            )
            .await
            .unwrap();

        let trace = h.tracer.get_trace(response.metadata.trace_id).unwrap();
        assert_eq!(trace.root_count(), 1);
        assert!(trace.is_complete());
        for span in &trace.spans {
            let end = span.ended_at.unwrap();
            assert!(!end.is_before(&span.started_at));
        }
    }

    #[tokio::test]
    async fn prompt_attribute_on_root_span_is_masked() {
        let h = harness(PolicyConfig::default());
        let response = h
            .orchestrator
            .execute(
                TaskType::Search,
                "customer kunde@example.com wants brake pads",
                caller(),
                Priority::Normal,
                deadline(),
            )
            .await
            .unwrap();

        let trace = h.tracer.get_trace(response.metadata.trace_id).unwrap();
        let root = trace.root().unwrap();
        let prompt = root.attribute("prompt").unwrap();
        assert!(prompt.is_sensitive());
        assert_eq!(prompt.display_value(), "[MASKED]");
    }
}
