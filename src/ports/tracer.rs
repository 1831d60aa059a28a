//! Tracer port - correlation ids and span trees for every request.
//!
//! Each orchestrated request owns one trace; every component attempt is a
//! span inside it. A trace has exactly one root span; every other span has
//! exactly one parent, and a closed span's end time is never before its
//! start time. A trace is complete only when all of its spans are closed.
//!
//! Span attributes that carry request content are stored masked by default;
//! reading the raw value is an explicit, audited action.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{SpanId, Timestamp, TraceId};

/// Placeholder shown instead of a sensitive attribute value.
pub const MASKED_VALUE: &str = "[MASKED]";

/// One key/value recorded on a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanAttribute {
    /// Attribute name (e.g. "provider", "strategy", "outcome").
    pub key: String,
    value: String,
    sensitive: bool,
}

impl SpanAttribute {
    /// Creates a plain attribute, readable by anyone.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            sensitive: false,
        }
    }

    /// Creates a content-bearing attribute, masked on read.
    pub fn sensitive(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            sensitive: true,
        }
    }

    /// The value as it may be displayed: masked when sensitive.
    pub fn display_value(&self) -> &str {
        if self.sensitive {
            MASKED_VALUE
        } else {
            &self.value
        }
    }

    /// Whether reads of this attribute are masked.
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// The raw value. Crate-internal; external reveals go through the
    /// tracer's audited `reveal_attribute`.
    pub(crate) fn raw_value(&self) -> &str {
        &self.value
    }
}

/// One unit of traced work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Span identity.
    pub id: SpanId,
    /// Parent span; `None` only for the trace root.
    pub parent_id: Option<SpanId>,
    /// Operation name (e.g. "fallback.immediate", "provider.call").
    pub name: String,
    /// When the span opened.
    pub started_at: Timestamp,
    /// When the span closed; `None` while in flight.
    pub ended_at: Option<Timestamp>,
    /// Attributes recorded at close.
    pub attributes: Vec<SpanAttribute>,
}

impl Span {
    /// True once the span has been closed.
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Duration in milliseconds, if closed.
    pub fn duration_ms(&self) -> Option<u64> {
        self.ended_at
            .map(|end| end.duration_since(&self.started_at).num_milliseconds().max(0) as u64)
    }

    /// Looks up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&SpanAttribute> {
        self.attributes.iter().find(|a| a.key == key)
    }
}

/// The full span tree for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Trace identity (the request correlation id).
    pub id: TraceId,
    /// When the trace opened.
    pub started_at: Timestamp,
    /// All spans, in creation order.
    pub spans: Vec<Span>,
}

impl Trace {
    /// The root span, if one has been started.
    pub fn root(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.parent_id.is_none())
    }

    /// Number of parentless spans; an invariant-respecting trace has one.
    pub fn root_count(&self) -> usize {
        self.spans.iter().filter(|s| s.parent_id.is_none()).count()
    }

    /// True when every span has been closed.
    pub fn is_complete(&self) -> bool {
        !self.spans.is_empty() && self.spans.iter().all(Span::is_closed)
    }

    /// Looks up a span by id.
    pub fn span(&self, id: SpanId) -> Option<&Span> {
        self.spans.iter().find(|s| s.id == id)
    }
}

/// Errors from trace operations.
#[derive(Debug, Clone, Error)]
pub enum TraceError {
    /// No trace with the given id (possibly pruned).
    #[error("trace not found: {0}")]
    TraceNotFound(TraceId),

    /// No span with the given id.
    #[error("span not found: {0}")]
    SpanNotFound(SpanId),

    /// A second parentless span was started in one trace.
    #[error("trace {0} already has a root span")]
    RootAlreadyExists(TraceId),

    /// The span was already closed.
    #[error("span already closed: {0}")]
    SpanAlreadyClosed(SpanId),
}

/// Port for trace recording and querying.
pub trait Tracer: Send + Sync {
    /// Opens a new trace and returns its correlation id.
    fn start_trace(&self) -> TraceId;

    /// Opens a span. `parent` is `None` only for the trace root.
    fn start_span(
        &self,
        trace_id: TraceId,
        parent: Option<SpanId>,
        name: &str,
    ) -> Result<SpanId, TraceError>;

    /// Closes a span, attaching its attributes.
    ///
    /// The recorded end time is clamped to be >= the start time.
    fn end_span(&self, span_id: SpanId, attributes: Vec<SpanAttribute>) -> Result<(), TraceError>;

    /// Returns the span tree for a trace.
    fn get_trace(&self, trace_id: TraceId) -> Result<Trace, TraceError>;

    /// Trace ids whose start falls inside `[from, to]`.
    fn traces_between(&self, from: Timestamp, to: Timestamp) -> Vec<TraceId>;

    /// Reveals the raw value of a masked attribute.
    ///
    /// Implementations must emit an audit log line naming `auditor` before
    /// returning the value.
    fn reveal_attribute(
        &self,
        trace_id: TraceId,
        span_id: SpanId,
        key: &str,
        auditor: &str,
    ) -> Result<Option<String>, TraceError>;

    /// Drops completed traces older than the retention window.
    ///
    /// Traces with open spans are never pruned.
    fn prune(&self, retention_secs: u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_attribute_displays_value() {
        let attr = SpanAttribute::new("provider", "openai-gpt4o");
        assert_eq!(attr.display_value(), "openai-gpt4o");
        assert!(!attr.is_sensitive());
    }

    #[test]
    fn sensitive_attribute_is_masked() {
        let attr = SpanAttribute::sensitive("prompt", "customer text");
        assert_eq!(attr.display_value(), MASKED_VALUE);
        assert!(attr.is_sensitive());
        assert_eq!(attr.raw_value(), "customer text");
    }

    #[test]
    fn open_span_has_no_duration() {
        let span = Span {
            id: SpanId::new(),
            parent_id: None,
            name: "root".to_string(),
            started_at: Timestamp::now(),
            ended_at: None,
            attributes: Vec::new(),
        };
        assert!(!span.is_closed());
        assert!(span.duration_ms().is_none());
    }

    #[test]
    fn trace_completeness_requires_all_spans_closed() {
        let start = Timestamp::now();
        let root = Span {
            id: SpanId::new(),
            parent_id: None,
            name: "root".to_string(),
            started_at: start,
            ended_at: Some(start.plus_secs(1)),
            attributes: Vec::new(),
        };
        let open_child = Span {
            id: SpanId::new(),
            parent_id: Some(root.id),
            name: "child".to_string(),
            started_at: start,
            ended_at: None,
            attributes: Vec::new(),
        };

        let mut trace = Trace {
            id: TraceId::new(),
            started_at: start,
            spans: vec![root, open_child],
        };
        assert!(!trace.is_complete());
        assert_eq!(trace.root_count(), 1);

        trace.spans[1].ended_at = Some(start.plus_secs(2));
        assert!(trace.is_complete());
    }
}
