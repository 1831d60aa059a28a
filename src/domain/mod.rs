//! Domain layer: pure types and value objects, no I/O.

pub mod context;
pub mod foundation;
pub mod provider;
pub mod response;
pub mod task;

pub use context::SanitizedContext;
pub use provider::{HealthState, ProviderClass, ProviderDescriptor};
pub use response::{
    AIResponse, FallbackLevel, IntentResult, ResponseMetadata, SearchHit, Suggestion, TaskResult,
};
pub use task::{CallerContext, CallerTier, Deadline, Priority, TaskRequest, TaskType};
