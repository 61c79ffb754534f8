//! Text normalization shared by extraction and validation.
//!
//! Covers bullet glyph detection for list inference and the canonical
//! string form used to compare oracle values.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse runs of whitespace (including line breaks) into one space.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Glyphs that mark a paragraph as a bullet item when typed literally.
pub const BULLET_GLYPHS: &[char] = &[
    '•', '◦', '▪', '▫', '‣', '⁃', '●', '○', '■', '□', // Dots and squares
    '►', '▸', '➢', '➤', '→', // Arrows
    '✓', '✔', '❖', // Marks
    '-', '–', '—', '*', // ASCII-ish dashes and stars
];

/// Check whether trimmed text begins with a bullet glyph.
pub fn starts_with_bullet(text: &str) -> bool {
    text.trim_start()
        .chars()
        .next()
        .is_some_and(|c| BULLET_GLYPHS.contains(&c))
}

/// Check whether a key consists solely of ASCII digits ("01", "2").
///
/// Such ordinal labels are exempt from the echo and duplicate checks.
pub fn is_numeric_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit())
}

/// Canonical form of a plain string: NFC, trimmed, whitespace collapsed.
pub fn canonical_text(text: &str) -> String {
    let composed: String = text.nfc().collect();
    WHITESPACE_COLLAPSE_REGEX
        .replace_all(composed.trim(), " ")
        .into_owned()
}

/// Canonical form of an arbitrary mapping value.
///
/// Strings go through [`canonical_text`]. Lists keep their order and
/// objects are serialized with sorted keys so the result is stable.
pub fn canonical_value(value: &Value) -> String {
    match value {
        Value::String(s) => canonical_text(s),
        other => canonicalize_json(other).to_string(),
    }
}

fn canonicalize_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(canonical_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize_json).collect()),
        // serde_json's default Map is ordered by key, which gives the stable ordering.
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (canonical_text(k), canonicalize_json(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
