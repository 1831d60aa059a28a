//! Redaction ruleset configuration.
//!
//! Raw pattern definitions for PII masking. The context builder compiles
//! these at construction time and fails closed if any pattern is invalid:
//! no context is ever emitted with an unverified ruleset.

use serde::Deserialize;

use super::error::ValidationError;

/// One operator-supplied redaction pattern.
///
/// Supplements the built-in email/phone/national-id patterns with
/// locale- or script-specific ones (the builtins must not assume a single
/// alphabet, and neither should these).
#[derive(Debug, Clone, Deserialize)]
pub struct CustomPattern {
    /// Operator-facing label (e.g. "iban", "plate_number").
    pub name: String,
    /// Regular expression matching the PII to mask.
    pub pattern: String,
    /// Placeholder inserted for each match. Defaults to "[PII]".
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

/// Redaction section of the application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedactionConfig {
    /// Additional patterns applied after the builtins.
    #[serde(default)]
    pub custom_patterns: Vec<CustomPattern>,
}

impl RedactionConfig {
    /// Validates that every custom pattern compiles.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for custom in &self.custom_patterns {
            regex::Regex::new(&custom.pattern).map_err(|err| {
                ValidationError::InvalidRedactionPattern {
                    pattern: custom.pattern.clone(),
                    reason: err.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

fn default_placeholder() -> String {
    "[PII]".to_string()
}
