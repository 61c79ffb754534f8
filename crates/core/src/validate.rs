//! Validation of oracle mappings against the extracted placeholders.
//!
//! The oracle is untrusted: it can decline, hallucinate keys, echo the
//! template text back or reuse one answer for several slots. A mapping
//! is accepted whole or rejected whole.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::mapping::{FillValue, Mapping};
use crate::normalize::{canonical_text, canonical_value, is_numeric_key};
use crate::types::{Placeholder, PlaceholderSet};

/// Reasons a mapping is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The oracle returned the `{"error": ...}` sentinel.
    #[error("oracle declined: {0}")]
    Declined(String),

    /// The mapping does not cover the placeholders one to one.
    #[error("expected {expected} keys, got {actual}")]
    KeyCountMismatch { expected: usize, actual: usize },

    /// The mapping names a key that is not a placeholder.
    #[error("unknown placeholder key '{0}'")]
    UnknownKey(String),

    /// A value is null, blank or otherwise falsy.
    #[error("empty value for '{0}'")]
    EmptyValue(String),

    /// A value repeats its own placeholder text.
    #[error("value for '{0}' echoes the placeholder text")]
    EchoedKey(String),

    /// Two placeholders received the same content.
    #[error("'{first}' and '{second}' share the same value")]
    DuplicateValue { first: String, second: String },
}

/// A mapping that passed every check, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMapping {
    mapping: Mapping,
}

impl ValidatedMapping {
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn into_inner(self) -> Mapping {
        self.mapping
    }

    /// Coerced value for a key, if the mapping has one.
    pub fn fill_value(&self, key: &str) -> Option<crate::Result<FillValue>> {
        self.mapping.get(key).map(|v| FillValue::from_json(key, v))
    }
}

/// Gatekeeper between the oracle and the renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `mapping` against `placeholders`, consuming it.
    pub fn validate(
        &self,
        mapping: Mapping,
        placeholders: &PlaceholderSet,
    ) -> Result<ValidatedMapping, ValidationError> {
        if let Some(reason) = mapping.declined_reason() {
            return Err(ValidationError::Declined(reason));
        }

        if mapping.len() != placeholders.len() {
            return Err(ValidationError::KeyCountMismatch {
                expected: placeholders.len(),
                actual: mapping.len(),
            });
        }

        if let Some((key, _)) = mapping.iter().find(|(k, _)| !placeholders.contains(k)) {
            return Err(ValidationError::UnknownKey(key.clone()));
        }

        // Walk in placeholder order so errors name keys deterministically.
        // Values are compared in the form the renderer will write them.
        let ordered: Vec<(&Placeholder, &Value)> = placeholders
            .iter()
            .filter_map(|p| mapping.get(&p.key).map(|v| (p, unwrapped(v))))
            .collect();

        for (placeholder, value) in &ordered {
            if is_falsy(value) {
                return Err(ValidationError::EmptyValue(placeholder.key.clone()));
            }
        }

        for (placeholder, value) in &ordered {
            if !is_numeric_key(&placeholder.key) && echoes_text(placeholder.literal(), value) {
                return Err(ValidationError::EchoedKey(placeholder.key.clone()));
            }
        }

        let mut seen: HashMap<String, &str> = HashMap::new();
        for (placeholder, value) in &ordered {
            let key = placeholder.key.as_str();
            if is_numeric_key(key) {
                continue;
            }
            if let Some(first) = seen.insert(canonical_value(value), key) {
                return Err(ValidationError::DuplicateValue {
                    first: first.to_string(),
                    second: key.to_string(),
                });
            }
        }

        log::debug!("Mapping accepted for {} placeholders", placeholders.len());
        Ok(ValidatedMapping { mapping })
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_falsy),
        Value::Object(map) => map.is_empty(),
    }
}

/// The value inside a `{"value": ...}` wrapper, or the value itself.
fn unwrapped(value: &Value) -> &Value {
    match value {
        Value::Object(map) if map.len() == 1 => match map.get("value") {
            Some(inner) => unwrapped(inner),
            None => value,
        },
        _ => value,
    }
}

fn echoes_text(literal: &str, value: &Value) -> bool {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return false,
    };
    canonical_text(&text).to_lowercase() == canonical_text(literal).to_lowercase()
}
