//! Application layer: the orchestration pipeline.
//!
//! Stateless engines (context builder, policy engine, normalizer), the
//! fallback chain and the orchestrator façade that wires them over the
//! ports.

mod context_builder;
mod fallback;
mod normalizer;
mod orchestrator;
mod policy_engine;

pub use context_builder::{
    estimate_tokens, ContextBuilder, EMAIL_PLACEHOLDER, ID_PLACEHOLDER, PHONE_PLACEHOLDER,
};
pub use fallback::{Candidate, FallbackManager, FallbackOutcome};
pub use normalizer::Normalizer;
pub use orchestrator::Orchestrator;
pub use policy_engine::{PolicyEngine, RankedProvider};
