//! Foundation value objects shared across the domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::{OrchestratorError, ValidationError};
pub use ids::{CallerId, ProviderId, RequestId, SpanId, TraceId};
pub use timestamp::Timestamp;
