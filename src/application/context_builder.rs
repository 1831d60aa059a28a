//! Context builder - the privacy and token-budget gate.
//!
//! Turns raw caller payloads into `SanitizedContext` values: every built-in
//! and custom PII pattern is masked, the result is truncated to the active
//! token budget keeping the most recent fragments, and a task-specific
//! prompt is rendered. No unsanitized content ever crosses this boundary.
//!
//! The redaction ruleset is compiled once at construction; a ruleset that
//! fails to compile fails construction, so no builder can exist with an
//! unverified ruleset.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{RedactionConfig, ValidationError as ConfigValidationError};
use crate::domain::foundation::OrchestratorError;
use crate::domain::{SanitizedContext, TaskType};

/// Placeholder substituted for e-mail addresses.
pub const EMAIL_PLACEHOLDER: &str = "[EMAIL]";
/// Placeholder substituted for phone numbers.
pub const PHONE_PLACEHOLDER: &str = "[PHONE]";
/// Placeholder substituted for national id numbers.
pub const ID_PLACEHOLDER: &str = "[ID]";

// Unicode-aware: local parts and hostnames are not restricted to ASCII.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}._%+-]+@[\p{L}\p{N}-]+(?:\.[\p{L}\p{N}-]+)+")
        .expect("builtin email pattern compiles")
});

// International (+49 151..., 0049...) and separator-grouped national forms.
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+|00)\d{1,3}[\s./-]?\d(?:[\s./()-]?\d){5,12}|\b0\d{2,4}[\s./-]\d(?:[\s./-]?\d){4,10}\b")
        .expect("builtin phone pattern compiles")
});

// Grouped id forms (SSN-like) and bare long digit runs.
static NATIONAL_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{2,3}[- ]\d{2,4}[- ]\d{3,5}\b|\b\d{9,14}\b")
        .expect("builtin id pattern compiles")
});

struct CompiledPattern {
    regex: Regex,
    placeholder: String,
}

/// Builds sanitized, bounded, task-specific contexts from raw payloads.
pub struct ContextBuilder {
    custom: Vec<CompiledPattern>,
}

impl ContextBuilder {
    /// Compiles the redaction ruleset. Fails closed on any invalid pattern.
    pub fn new(config: &RedactionConfig) -> Result<Self, ConfigValidationError> {
        let mut custom = Vec::with_capacity(config.custom_patterns.len());
        for pattern in &config.custom_patterns {
            let regex = Regex::new(&pattern.pattern).map_err(|err| {
                ConfigValidationError::InvalidRedactionPattern {
                    pattern: pattern.pattern.clone(),
                    reason: err.to_string(),
                }
            })?;
            custom.push(CompiledPattern {
                regex,
                placeholder: pattern.placeholder.clone(),
            });
        }
        Ok(Self { custom })
    }

    /// Builds a sanitized context for `task_type` within `budget` tokens.
    ///
    /// Redaction runs over the full payload first; truncation then keeps the
    /// most recent fragments (lines) that fit. When truncation would leave
    /// fewer than `min_required` useful tokens, the request is rejected with
    /// `ContextTooLarge` rather than sent in a mutilated form.
    pub fn build(
        &self,
        task_type: TaskType,
        payload: &str,
        budget: u32,
        min_required: u32,
    ) -> Result<SanitizedContext, OrchestratorError> {
        let (clean, redactions_applied) = self.redact(payload);

        let fragments: Vec<String> = clean
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        let template = prompt_template(task_type);
        let budget_chars = (budget as usize).saturating_mul(4);
        let available_chars = budget_chars.saturating_sub(template.chars().count());

        // Keep the newest fragments that fit, oldest dropped first.
        let mut kept: Vec<&String> = Vec::new();
        let mut used_chars = 0usize;
        for fragment in fragments.iter().rev() {
            let cost = fragment.chars().count() + if kept.is_empty() { 0 } else { 1 };
            if used_chars + cost > available_chars {
                break;
            }
            used_chars += cost;
            kept.push(fragment);
        }
        kept.reverse();

        let kept_tokens = estimate_tokens_chars(used_chars);
        let truncated = kept.len() < fragments.len();
        if kept.is_empty() || (truncated && kept_tokens < min_required) {
            let full_tokens =
                estimate_tokens_chars(template.chars().count() + clean.chars().count());
            return Err(OrchestratorError::context_too_large(full_tokens, budget));
        }

        let content = kept
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("{template}{content}");
        let token_count = estimate_tokens(&prompt);

        Ok(SanitizedContext::new(
            task_type,
            kept.into_iter().cloned().collect(),
            prompt,
            token_count,
            redactions_applied,
        ))
    }

    /// Masks every PII match in `text`, returning the clean text and the
    /// number of substitutions made.
    pub fn redact(&self, text: &str) -> (String, u32) {
        let mut redactions = 0u32;
        let mut current = text.to_string();
        let builtins: [(&Regex, &str); 3] = [
            (&EMAIL_PATTERN, EMAIL_PLACEHOLDER),
            (&PHONE_PATTERN, PHONE_PLACEHOLDER),
            (&NATIONAL_ID_PATTERN, ID_PLACEHOLDER),
        ];
        for (regex, placeholder) in builtins {
            let matched = regex.find_iter(&current).count() as u32;
            if matched > 0 {
                redactions += matched;
                current = regex.replace_all(&current, placeholder).into_owned();
            }
        }
        for pattern in &self.custom {
            let matched = pattern.regex.find_iter(&current).count() as u32;
            if matched > 0 {
                redactions += matched;
                current = pattern
                    .regex
                    .replace_all(&current, pattern.placeholder.as_str())
                    .into_owned();
            }
        }
        (current, redactions)
    }
}

/// Estimates token count of a text at roughly four characters per token.
pub fn estimate_tokens(text: &str) -> u32 {
    estimate_tokens_chars(text.chars().count())
}

fn estimate_tokens_chars(chars: usize) -> u32 {
    chars.div_ceil(4) as u32
}

fn prompt_template(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Search => "Find catalog items matching this request:\n",
        TaskType::Classification => "Classify the intent of this customer message:\n",
        TaskType::Suggestion => "Suggest helpful follow-ups for this conversation:\n",
    }
}
