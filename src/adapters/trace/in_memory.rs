//! In-memory tracer.
//!
//! Stores span trees keyed by trace id with a span-to-trace index for O(1)
//! span close. Enforces the trace invariants at write time: one root per
//! trace, parents must exist, spans close once, and a close timestamp is
//! clamped to never precede the span's start.

use dashmap::DashMap;

use crate::domain::foundation::{SpanId, Timestamp, TraceId};
use crate::ports::{Span, SpanAttribute, Trace, TraceError, Tracer};

/// Process-local trace store.
#[derive(Default)]
pub struct InMemoryTracer {
    traces: DashMap<TraceId, Trace>,
    span_index: DashMap<SpanId, TraceId>,
}

impl InMemoryTracer {
    /// Creates an empty tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored traces.
    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }
}

impl Tracer for InMemoryTracer {
    fn start_trace(&self) -> TraceId {
        let id = TraceId::new();
        self.traces.insert(
            id,
            Trace {
                id,
                started_at: Timestamp::now(),
                spans: Vec::new(),
            },
        );
        id
    }

    fn start_span(
        &self,
        trace_id: TraceId,
        parent: Option<SpanId>,
        name: &str,
    ) -> Result<SpanId, TraceError> {
        let mut trace = self
            .traces
            .get_mut(&trace_id)
            .ok_or(TraceError::TraceNotFound(trace_id))?;

        match parent {
            None => {
                if trace.root().is_some() {
                    return Err(TraceError::RootAlreadyExists(trace_id));
                }
            }
            Some(parent_id) => {
                if trace.span(parent_id).is_none() {
                    return Err(TraceError::SpanNotFound(parent_id));
                }
            }
        }

        let span_id = SpanId::new();
        trace.spans.push(Span {
            id: span_id,
            parent_id: parent,
            name: name.to_string(),
            started_at: Timestamp::now(),
            ended_at: None,
            attributes: Vec::new(),
        });
        self.span_index.insert(span_id, trace_id);
        Ok(span_id)
    }

    fn end_span(&self, span_id: SpanId, attributes: Vec<SpanAttribute>) -> Result<(), TraceError> {
        let trace_id = *self
            .span_index
            .get(&span_id)
            .ok_or(TraceError::SpanNotFound(span_id))?;
        let mut trace = self
            .traces
            .get_mut(&trace_id)
            .ok_or(TraceError::TraceNotFound(trace_id))?;
        let span = trace
            .spans
            .iter_mut()
            .find(|s| s.id == span_id)
            .ok_or(TraceError::SpanNotFound(span_id))?;
        if span.is_closed() {
            return Err(TraceError::SpanAlreadyClosed(span_id));
        }

        // Clock skew between start and end reads must not produce a
        // negative duration.
        let now = Timestamp::now();
        span.ended_at = Some(if now.is_before(&span.started_at) {
            span.started_at
        } else {
            now
        });
        span.attributes = attributes;
        Ok(())
    }

    fn get_trace(&self, trace_id: TraceId) -> Result<Trace, TraceError> {
        self.traces
            .get(&trace_id)
            .map(|t| t.value().clone())
            .ok_or(TraceError::TraceNotFound(trace_id))
    }

    fn traces_between(&self, from: Timestamp, to: Timestamp) -> Vec<TraceId> {
        self.traces
            .iter()
            .filter(|t| !t.started_at.is_before(&from) && !t.started_at.is_after(&to))
            .map(|t| t.id)
            .collect()
    }

    fn reveal_attribute(
        &self,
        trace_id: TraceId,
        span_id: SpanId,
        key: &str,
        auditor: &str,
    ) -> Result<Option<String>, TraceError> {
        let trace = self
            .traces
            .get(&trace_id)
            .ok_or(TraceError::TraceNotFound(trace_id))?;
        let span = trace
            .span(span_id)
            .ok_or(TraceError::SpanNotFound(span_id))?;

        match span.attribute(key) {
            None => Ok(None),
            Some(attribute) => {
                tracing::warn!(
                    target: "audit",
                    trace_id = %trace_id,
                    span_id = %span_id,
                    attribute = key,
                    auditor,
                    sensitive = attribute.is_sensitive(),
                    "span attribute revealed"
                );
                Ok(Some(attribute.raw_value().to_string()))
            }
        }
    }

    fn prune(&self, retention_secs: u64) {
        let cutoff = Timestamp::now().minus_secs(retention_secs);
        let mut removed_spans = Vec::new();
        self.traces.retain(|_, trace| {
            let expired = trace.started_at.is_before(&cutoff);
            let has_open_spans = !trace.spans.is_empty() && !trace.is_complete();
            // Traces with open spans are never pruned, whatever their age.
            let keep = !expired || has_open_spans;
            if !keep {
                removed_spans.extend(trace.spans.iter().map(|s| s.id));
            }
            keep
        });
        for span_id in removed_spans {
            self.span_index.remove(&span_id);
        }
    }
}
