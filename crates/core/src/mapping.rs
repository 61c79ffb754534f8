//! Oracle replies: strict parsing into a [`Mapping`] and per-value
//! coercion into [`FillValue`].

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// A reply wrapped in one code fence, with an optional language tag.
static CODE_FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\s*```\z").unwrap()
});

/// Key the oracle uses to decline instead of returning a mapping.
pub const ERROR_SENTINEL: &str = "error";

/// Untrusted placeholder → content assignment returned by the oracle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Mapping {
    entries: Map<String, Value>,
}

impl Mapping {
    /// Parse a raw oracle reply.
    ///
    /// The reply must be exactly one JSON object, optionally wrapped in a
    /// single code fence. Anything else fails closed with
    /// [`Error::GenerationMalformed`].
    pub fn from_reply(reply: &str) -> Result<Self> {
        let trimmed = reply.trim();

        let body = if trimmed.starts_with("```") {
            CODE_FENCE_REGEX
                .captures(trimmed)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
                .ok_or_else(|| Error::GenerationMalformed("unterminated code fence".to_string()))?
        } else {
            trimmed
        };

        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::GenerationMalformed(format!("invalid JSON: {}", e)))?;

        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(Error::GenerationMalformed(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Reason given by the oracle when it declined, if it did.
    pub fn declined_reason(&self) -> Option<String> {
        self.entries.get(ERROR_SENTINEL).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Map<String, Value>> for Mapping {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A mapping value after coercion, the only forms the renderer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillValue {
    /// Replacement text for the whole placeholder.
    Text(String),
    /// One item per paragraph.
    List(Vec<String>),
    /// Clear the placeholder text, keeping its structure.
    Empty,
}

impl FillValue {
    /// Coerce a raw mapping value.
    ///
    /// Accepts strings, null, lists of strings and a `{"value": ...}`
    /// wrapper around any of those. Every other shape is a render error.
    /// Text is trimmed, matching how placeholder keys are read back.
    pub fn from_json(key: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::Empty),
            Value::String(s) if s.trim().is_empty() => Ok(Self::Empty),
            Value::String(s) => Ok(Self::Text(s.trim().to_string())),
            Value::Array(items) if items.is_empty() => Ok(Self::Empty),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(unsupported(key, other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            Value::Object(map) if map.len() == 1 => match map.get("value") {
                Some(inner @ (Value::Null | Value::String(_) | Value::Array(_))) => {
                    Self::from_json(key, inner)
                }
                _ => Err(unsupported(key, value)),
            },
            other => Err(unsupported(key, other)),
        }
    }

    /// Single-string form, joining list items with `", "`.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::List(items) => Some(items.join(", ")),
            Self::Empty => None,
        }
    }

    /// List form, wrapping a single string as a one-item list.
    pub fn into_items(self) -> Vec<String> {
        match self {
            Self::Text(s) => vec![s],
            Self::List(items) => items,
            Self::Empty => Vec::new(),
        }
    }
}

fn unsupported(key: &str, value: &Value) -> Error {
    Error::RenderError {
        key: key.to_string(),
        reason: format!("unsupported value type: {}", json_type_name(value)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
