//! Ports: trait seams between the orchestration core and its adapters.

mod budget_tracker;
mod metrics;
mod provider_adapter;
mod rate_limiter;
mod response_cache;
mod tracer;

pub use budget_tracker::{
    BudgetDecision, BudgetLimits, BudgetStatus, BudgetTracker, SpendRecord,
};
pub use metrics::{
    AttemptOutcome, ExportFormat, HealthSignal, MetricSample, MetricsCollector,
    ProviderHealthReport, ProviderStats,
};
pub use provider_adapter::{
    ProviderAdapter, ProviderCallConfig, ProviderError, RawProviderResponse,
};
pub use rate_limiter::{
    RateLimitDenied, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter, WindowLimit,
};
pub use response_cache::{CacheEntry, CacheKey, ResponseCache};
pub use tracer::{Span, SpanAttribute, Trace, TraceError, Tracer, MASKED_VALUE};
