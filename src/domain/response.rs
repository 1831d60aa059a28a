//! Canonical AI response shapes.
//!
//! Providers return arbitrary JSON; the normalizer maps it into exactly one
//! `TaskResult` variant per task type. Nothing leaves the subsystem in a
//! provider-specific shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::foundation::{ProviderId, TraceId};
use super::task::TaskType;

/// Which fallback strategy ultimately produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    /// Served from a non-expired cache entry; zero provider calls.
    Cache,
    /// First pass over the ranked provider list succeeded.
    Immediate,
    /// A backoff retry of a top provider succeeded.
    Delayed,
    /// A retry with a shrunken context succeeded.
    Simplified,
    /// Synthesized locally without any successful provider call.
    Degraded,
}

impl FallbackLevel {
    /// Returns the string representation used in metrics and span attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackLevel::Cache => "cache",
            FallbackLevel::Immediate => "immediate",
            FallbackLevel::Delayed => "delayed",
            FallbackLevel::Simplified => "simplified",
            FallbackLevel::Degraded => "degraded",
        }
    }
}

impl fmt::Display for FallbackLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ranked hit from a semantic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identifier of the matched catalog entry.
    pub item_id: String,
    /// Display title of the match.
    pub title: String,
    /// Relevance score in [0, 1].
    pub relevance: f64,
}

/// Structured intent classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    /// Detected intent label.
    pub intent: String,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
    /// Extracted entities (already sanitized upstream).
    #[serde(default)]
    pub entities: HashMap<String, String>,
}

/// A single generated suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Suggestion text.
    pub text: String,
    /// Optional ranking score in [0, 1].
    #[serde(default)]
    pub score: Option<f64>,
}

/// Canonical, task-type-specific result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    /// Ranked search results.
    SearchResults { hits: Vec<SearchHit> },
    /// A single classified intent.
    Intent { result: IntentResult },
    /// Generated suggestions.
    Suggestions { items: Vec<Suggestion> },
}

impl TaskResult {
    /// Task type this result shape belongs to.
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskResult::SearchResults { .. } => TaskType::Search,
            TaskResult::Intent { .. } => TaskType::Classification,
            TaskResult::Suggestions { .. } => TaskType::Suggestion,
        }
    }

    /// Minimal empty shape for a task type, used by graceful degradation.
    pub fn empty_for(task_type: TaskType) -> Self {
        match task_type {
            TaskType::Search => TaskResult::SearchResults { hits: Vec::new() },
            TaskType::Classification => TaskResult::Intent {
                result: IntentResult {
                    intent: "unknown".to_string(),
                    confidence: 0.0,
                    entities: HashMap::new(),
                },
            },
            TaskType::Suggestion => TaskResult::Suggestions { items: Vec::new() },
        }
    }

    /// True when the result is the empty/degraded shape.
    pub fn is_empty(&self) -> bool {
        match self {
            TaskResult::SearchResults { hits } => hits.is_empty(),
            TaskResult::Intent { result } => result.confidence == 0.0,
            TaskResult::Suggestions { items } => items.is_empty(),
        }
    }
}

/// Metadata describing how a response was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Provider that produced the result, if any.
    pub provider_used: Option<ProviderId>,
    /// Strategy that produced the result.
    pub fallback_level: FallbackLevel,
    /// True when no provider call succeeded and the result was synthesized.
    pub is_degraded: bool,
    /// Tokens consumed by the producing call (zero for cache/degraded).
    pub tokens_used: u32,
    /// Estimated cost in cents (zero for cache/degraded).
    pub cost_estimate_cents: u32,
    /// Trace covering the whole request.
    pub trace_id: TraceId,
}

/// The canonical response returned to domain services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIResponse {
    /// Task-type-specific result.
    pub result: TaskResult,
    /// How it was produced.
    pub metadata: ResponseMetadata,
}

impl AIResponse {
    /// Creates a response.
    pub fn new(result: TaskResult, metadata: ResponseMetadata) -> Self {
        Self { result, metadata }
    }

    /// Creates a degraded response with the minimal shape for the task type.
    pub fn degraded(task_type: TaskType, trace_id: TraceId) -> Self {
        Self {
            result: TaskResult::empty_for(task_type),
            metadata: ResponseMetadata {
                provider_used: None,
                fallback_level: FallbackLevel::Degraded,
                is_degraded: true,
                tokens_used: 0,
                cost_estimate_cents: 0,
                trace_id,
            },
        }
    }
}
