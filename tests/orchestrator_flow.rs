//! End-to-end tests of the orchestration pipeline over in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use ai_orchestrator::adapters::ai::{MockProvider, MockReply, ProviderRegistry};
use ai_orchestrator::adapters::budget::InMemoryBudgetTracker;
use ai_orchestrator::adapters::cache::InMemoryResponseCache;
use ai_orchestrator::adapters::metrics::InMemoryMetricsCollector;
use ai_orchestrator::adapters::rate_limiter::InMemoryRateLimiter;
use ai_orchestrator::adapters::trace::InMemoryTracer;
use ai_orchestrator::application::{ContextBuilder, Orchestrator};
use ai_orchestrator::config::{PolicyConfig, PolicyStore, RedactionConfig};
use ai_orchestrator::domain::foundation::{CallerId, OrchestratorError, ProviderId};
use ai_orchestrator::domain::{
    CallerContext, CallerTier, Deadline, FallbackLevel, Priority, ProviderClass, TaskType,
};
use ai_orchestrator::ports::{ProviderError, Tracer};

struct Harness {
    orchestrator: Orchestrator,
    tracer: Arc<InMemoryTracer>,
}

fn harness(policy: PolicyConfig, providers: Vec<Arc<MockProvider>>) -> Harness {
    let tracer = Arc::new(InMemoryTracer::new());
    let registry = Arc::new(ProviderRegistry::new());
    for provider in providers {
        registry.register(provider);
    }
    let orchestrator = Orchestrator::new(
        Arc::new(PolicyStore::new(policy)),
        Arc::new(ContextBuilder::new(&RedactionConfig::default()).expect("valid ruleset")),
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
    }
}

fn provider(id: &str, class: ProviderClass, cost: u32) -> Arc<MockProvider> {
    Arc::new(MockProvider::new(ProviderId::new(id).expect("valid id"), class).with_cost(cost))
}

fn caller() -> CallerContext {
    CallerContext::new(
        CallerId::new("parts-service").expect("valid id"),
        CallerTier::Standard,
    )
}

fn deadline() -> Deadline {
    Deadline::from_now(Duration::from_secs(5))
}

#[tokio::test]
async fn healthy_top_provider_serves_at_immediate_level() {
    let alpha = provider("alpha", ProviderClass::Standard, 1);
    let beta = provider("beta", ProviderClass::Standard, 5);
    let h = harness(PolicyConfig::default(), vec![alpha.clone(), beta.clone()]);

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
        .expect("request should resolve");

    assert_eq!(response.metadata.fallback_level, FallbackLevel::Immediate);
    assert_eq!(
        response.metadata.provider_used.as_ref().map(|p| p.as_str()),
        Some("alpha")
    );
    assert_eq!(alpha.call_count(), 1);
    assert_eq!(beta.call_count(), 0);
}

#[tokio::test]
async fn transient_failure_falls_through_to_next_provider() {
    let alpha = provider("alpha", ProviderClass::Standard, 1);
    alpha.push_reply(MockReply::Fail(ProviderError::provider("upstream 503")));
    let beta = provider("beta", ProviderClass::Standard, 5);
    let h = harness(PolicyConfig::default(), vec![alpha, beta.clone()]);

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
        .expect("request should resolve");

    assert_eq!(response.metadata.fallback_level, FallbackLevel::Immediate);
    assert_eq!(
        response.metadata.provider_used.as_ref().map(|p| p.as_str()),
        Some("beta")
    );
    assert_eq!(beta.call_count(), 1);
}

#[tokio::test]
async fn pii_never_reaches_the_recorded_prompt() {
    let h = harness(
        PolicyConfig::default(),
        vec![provider("alpha", ProviderClass::Standard, 1)],
    );

    let response = h
        .orchestrator
        .execute(
            TaskType::Classification,
            "I am kunde@example.de, call +49 151 2345 6789, customer no 123456789012",
            caller(),
            Priority::Normal,
            deadline(),
        )
        .await
        .expect("request should resolve");

    let trace = h
        .tracer
        .get_trace(response.metadata.trace_id)
        .expect("trace exists");
    let root = trace.root().expect("root span");
    let root_id = root.id;

    // The prompt attribute is masked on display and only readable through
    // the audited reveal; even the raw value must be free of PII.
    let attribute = root.attribute("prompt").expect("prompt recorded");
    assert_eq!(attribute.display_value(), "[MASKED]");
    let revealed = h
        .tracer
        .reveal_attribute(response.metadata.trace_id, root_id, "prompt", "test-audit")
        .expect("reveal succeeds")
        .expect("value present");
    assert!(!revealed.contains("example.de"));
    assert!(!revealed.contains("2345"));
    assert!(!revealed.contains("123456789012"));
    assert!(revealed.contains("[EMAIL]"));
}

#[tokio::test]
async fn identical_request_is_served_from_cache_without_provider_io() {
    let alpha = provider("alpha", ProviderClass::Standard, 1);
    let h = harness(PolicyConfig::default(), vec![alpha.clone()]);

    let first = h
        .orchestrator
        .execute(
            TaskType::Suggestion,
            "customer asked for winter tires",
            caller(),
            Priority::Normal,
            deadline(),
        )
        .await
        .expect("first request resolves");
    assert_eq!(first.metadata.fallback_level, FallbackLevel::Immediate);

    let second = h
        .orchestrator
        .execute(
            TaskType::Suggestion,
            "customer asked for winter tires",
            caller(),
            Priority::Normal,
            deadline(),
        )
        .await
        .expect("second request resolves");

    assert_eq!(second.metadata.fallback_level, FallbackLevel::Cache);
    assert_eq!(second.result, first.result);
    assert_eq!(second.metadata.tokens_used, 0);
    assert_eq!(second.metadata.cost_estimate_cents, 0);
    assert_eq!(alpha.call_count(), 1);
}

#[tokio::test]
async fn request_over_the_window_is_rejected_before_any_provider_call() {
    let policy = PolicyConfig {
        caller_requests_per_minute: 3,
        ..Default::default()
    };
    let alpha = provider("alpha", ProviderClass::Standard, 1);
    let h = harness(policy, vec![alpha.clone()]);

    for i in 0..3 {
        h.orchestrator
            .execute(
                TaskType::Search,
                format!("query number {i}"),
                caller(),
                Priority::Normal,
                deadline(),
            )
            .await
            .expect("within the window");
    }

    let err = h
        .orchestrator
        .execute(
            TaskType::Search,
            "one query too many",
            caller(),
            Priority::Normal,
            deadline(),
        )
        .await
        .expect_err("fourth request must be limited");
    assert!(matches!(err, OrchestratorError::RateLimitExceeded { .. }));
    assert_eq!(alpha.call_count(), 3);
}

#[tokio::test]
async fn budget_ceiling_is_enforced_before_any_provider_call() {
    let policy = PolicyConfig {
        caller_daily_budget_cents: 10,
        ..Default::default()
    };
    let pricey = provider("pricey", ProviderClass::Premium, 50);
    let h = harness(policy, vec![pricey.clone()]);

    let err = h
        .orchestrator
        .execute(
            TaskType::Search,
            "anything at all",
            caller(),
            Priority::Normal,
            deadline(),
        )
        .await
        .expect_err("reservation must fail");
    assert!(matches!(err, OrchestratorError::BudgetExceeded { .. }));
    assert_eq!(pricey.call_count(), 0);
}

#[tokio::test]
async fn expired_deadline_still_returns_a_degraded_response() {
    let slow = provider("slow", ProviderClass::Standard, 1);
    let h = harness(PolicyConfig::default(), vec![slow.clone()]);

    let tight = Deadline::from_now(Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let response = h
        .orchestrator
        .execute(
            TaskType::Search,
            "brake pads",
            caller(),
            Priority::High,
            tight,
        )
        .await
        .expect("degraded response, never an error");

    assert!(response.metadata.is_degraded);
    assert_eq!(response.metadata.fallback_level, FallbackLevel::Degraded);
    assert_eq!(slow.call_count(), 0);
}

#[tokio::test]
async fn every_resolved_request_leaves_one_complete_trace() {
    let h = harness(
        PolicyConfig::default(),
        vec![provider("alpha", ProviderClass::Standard, 1)],
    );

    let response = h
        .orchestrator
        .execute(
            TaskType::Classification,
            "where is my order?",
            caller(),
            Priority::Normal,
            deadline(),
        )
        .await
        .expect("request resolves");

    let trace = h
        .tracer
        .get_trace(response.metadata.trace_id)
        .expect("trace exists");
    assert_eq!(trace.root_count(), 1);
    assert!(trace.is_complete());
    for span in &trace.spans {
        let end = span.ended_at.expect("span closed");
        assert!(!end.is_before(&span.started_at));
    }
}

#[tokio::test]
async fn kill_switch_degrades_every_request_without_io() {
    let policy = PolicyConfig {
        ai_enabled: false,
        ..Default::default()
    };
    let alpha = provider("alpha", ProviderClass::Standard, 1);
    let h = harness(policy, vec![alpha.clone()]);

    let response = h
        .orchestrator
        .execute(
            TaskType::Suggestion,
            "anything",
            caller(),
            Priority::Normal,
            deadline(),
        )
        .await
        .expect("degraded, not an error");
    assert!(response.metadata.is_degraded);
    assert_eq!(alpha.call_count(), 0);
}

#[tokio::test]
async fn all_providers_failing_degrades_instead_of_erroring() {
    let alpha = provider("alpha", ProviderClass::Standard, 1);
    // Exhaust immediate plus every delayed retry.
    for _ in 0..8 {
        alpha.push_reply(MockReply::Fail(ProviderError::provider("down")));
    }
    let policy = PolicyConfig {
        backoff_base_ms: 1,
        ..Default::default()
    };
    let h = harness(policy, vec![alpha]);

    let response = h
        .orchestrator
        .execute(
            TaskType::Search,
            "brake pads",
            caller(),
            Priority::Normal,
            deadline(),
        )
        .await
        .expect("degraded, not an error");

    assert!(response.metadata.is_degraded);
    assert!(response.result.is_empty());
    assert!(response.metadata.provider_used.is_none());
}

#[tokio::test]
async fn callers_are_rate_limited_independently() {
    let policy = PolicyConfig {
        caller_requests_per_minute: 1,
        ..Default::default()
    };
    let h = harness(policy, vec![provider("alpha", ProviderClass::Standard, 1)]);

    h.orchestrator
        .execute(TaskType::Search, "first", caller(), Priority::Normal, deadline())
        .await
        .expect("first caller within window");

    let other = CallerContext::new(
        CallerId::new("chat-service").expect("valid id"),
        CallerTier::Premium,
    );
    h.orchestrator
        .execute(TaskType::Search, "second caller query", other, Priority::Normal, deadline())
        .await
        .expect("second caller has its own window");
}

#[tokio::test]
async fn maintenance_keeps_descriptors_fresh() {
    let alpha = provider("alpha", ProviderClass::Standard, 1);
    let h = harness(PolicyConfig::default(), vec![alpha]);

    h.orchestrator
        .execute(TaskType::Search, "warm up", caller(), Priority::Normal, deadline())
        .await
        .expect("resolves");
    h.orchestrator.run_maintenance().await;

    // A second request after maintenance still routes normally.
    let response = h
        .orchestrator
        .execute(TaskType::Search, "fresh query", caller(), Priority::Normal, deadline())
        .await
        .expect("resolves");
    assert!(!response.metadata.is_degraded);
}
