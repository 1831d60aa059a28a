//! AI request orchestration core.
//!
//! A control plane that sits between domain services and external AI
//! providers: it sanitizes caller input, enforces rate and cost policy
//! before any network I/O, ranks providers on live cost/reliability
//! signals, and degrades gracefully through a fixed fallback ladder so a
//! caller always receives a canonical response within its deadline.
//!
//! # Architecture
//!
//! Hexagonal, in four layers:
//!
//! - `domain` - pure value objects and the caller-visible error surface;
//! - `ports` - trait seams (provider adapter, cache, rate limiter, budget
//!   tracker, metrics, tracer);
//! - `application` - the pipeline: context builder, policy engine,
//!   normalizer, fallback manager, orchestrator;
//! - `adapters` - in-memory implementations of every port plus the
//!   provider registry and a scriptable mock provider.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use ai_orchestrator::adapters::ai::{MockProvider, ProviderRegistry};
//! use ai_orchestrator::adapters::budget::InMemoryBudgetTracker;
//! use ai_orchestrator::adapters::cache::InMemoryResponseCache;
//! use ai_orchestrator::adapters::metrics::InMemoryMetricsCollector;
//! use ai_orchestrator::adapters::rate_limiter::InMemoryRateLimiter;
//! use ai_orchestrator::adapters::trace::InMemoryTracer;
//! use ai_orchestrator::application::{ContextBuilder, Orchestrator};
//! use ai_orchestrator::config::{PolicyStore, RedactionConfig};
//! use ai_orchestrator::domain::foundation::{CallerId, ProviderId};
//! use ai_orchestrator::domain::{
//!     CallerContext, CallerTier, Deadline, Priority, ProviderClass, TaskType,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ProviderRegistry::new());
//! registry.register(Arc::new(MockProvider::new(
//!     ProviderId::new("local-rules")?,
//!     ProviderClass::Local,
//! )));
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(PolicyStore::default()),
//!     Arc::new(ContextBuilder::new(&RedactionConfig::default())?),
//!     registry,
//!     Arc::new(InMemoryResponseCache::new()),
//!     Arc::new(InMemoryRateLimiter::new()),
//!     Arc::new(InMemoryBudgetTracker::new()),
//!     Arc::new(InMemoryMetricsCollector::new()),
//!     Arc::new(InMemoryTracer::new()),
//! );
//!
//! let response = orchestrator
//!     .execute(
//!         TaskType::Search,
//!         "brake pads for a 2018 Golf",
//!         CallerContext::new(CallerId::new("parts-service")?, CallerTier::Standard),
//!         Priority::Normal,
//!         Deadline::from_now(Duration::from_secs(5)),
//!     )
//!     .await?;
//! println!("served at level {}", response.metadata.fallback_level);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
