//! Response normalizer - one canonical shape per task type.
//!
//! Providers answer in their own JSON dialects; this module validates the
//! body and converts it into exactly one `TaskResult` variant. Anything
//! missing, mistyped or out of range makes the whole attempt a provider
//! failure; no partially-valid response ever leaves the subsystem.

use serde_json::Value;
use std::collections::HashMap;

use crate::domain::{IntentResult, SearchHit, Suggestion, TaskResult, TaskType};
use crate::ports::ProviderError;

/// Stateless validation and conversion of raw provider bodies.
pub struct Normalizer;

impl Normalizer {
    /// Converts a raw provider body into the canonical result for `task_type`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Validation` when the body does not conform;
    /// the fallback manager treats this like any other provider failure.
    pub fn normalize(task_type: TaskType, body: &Value) -> Result<TaskResult, ProviderError> {
        match task_type {
            TaskType::Search => Self::normalize_search(body),
            TaskType::Classification => Self::normalize_classification(body),
            TaskType::Suggestion => Self::normalize_suggestion(body),
        }
    }

    fn normalize_search(body: &Value) -> Result<TaskResult, ProviderError> {
        let hits = require_array(body, "hits")?;
        let mut out = Vec::with_capacity(hits.len());
        for (index, hit) in hits.iter().enumerate() {
            let item_id = require_string(hit, "item_id")
                .map_err(|e| at_index("hits", index, e))?;
            let title =
                require_string(hit, "title").map_err(|e| at_index("hits", index, e))?;
            let relevance = require_unit_score(hit, "relevance")
                .map_err(|e| at_index("hits", index, e))?;
            out.push(SearchHit {
                item_id,
                title,
                relevance,
            });
        }
        Ok(TaskResult::SearchResults { hits: out })
    }

    fn normalize_classification(body: &Value) -> Result<TaskResult, ProviderError> {
        let intent = require_string(body, "intent")?;
        let confidence = require_unit_score(body, "confidence")?;
        let mut entities = HashMap::new();
        if let Some(raw) = body.get("entities") {
            let map = raw.as_object().ok_or_else(|| {
                ProviderError::validation("field 'entities' must be an object")
            })?;
            for (key, value) in map {
                let value = value.as_str().ok_or_else(|| {
                    ProviderError::validation(format!("entity '{key}' must be a string"))
                })?;
                entities.insert(key.clone(), value.to_string());
            }
        }
        Ok(TaskResult::Intent {
            result: IntentResult {
                intent,
                confidence,
                entities,
            },
        })
    }

    fn normalize_suggestion(body: &Value) -> Result<TaskResult, ProviderError> {
        let items = require_array(body, "suggestions")?;
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let text = require_string(item, "text")
                .map_err(|e| at_index("suggestions", index, e))?;
            let score = match item.get("score") {
                None | Some(Value::Null) => None,
                Some(_) => Some(
                    require_unit_score(item, "score")
                        .map_err(|e| at_index("suggestions", index, e))?,
                ),
            };
            out.push(Suggestion { text, score });
        }
        Ok(TaskResult::Suggestions { items: out })
    }
}

fn require_array<'a>(value: &'a Value, field: &str) -> Result<&'a Vec<Value>, ProviderError> {
    value
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::validation(format!("field '{field}' must be an array")))
}

fn require_string(value: &Value, field: &str) -> Result<String, ProviderError> {
    let s = value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::validation(format!("field '{field}' must be a string")))?;
    if s.trim().is_empty() {
        return Err(ProviderError::validation(format!(
            "field '{field}' must not be empty"
        )));
    }
    Ok(s.to_string())
}

fn require_unit_score(value: &Value, field: &str) -> Result<f64, ProviderError> {
    let score = value
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| ProviderError::validation(format!("field '{field}' must be a number")))?;
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(ProviderError::validation(format!(
            "field '{field}' must be within [0, 1], got {score}"
        )));
    }
    Ok(score)
}

fn at_index(field: &str, index: usize, inner: ProviderError) -> ProviderError {
    ProviderError::validation(format!("{field}[{index}]: {inner}"))
}
