//! Domain types for placeholders extracted from a template slide.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Structural kind of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    /// Single block of text.
    Text,
    /// Bulleted or indented paragraphs, one item per paragraph.
    List,
}

/// A text-bearing shape in the template slide, addressed by its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Trimmed literal shape text (qualified with `#n` when duplicated).
    pub key: String,

    /// Inferred kind.
    pub kind: PlaceholderKind,

    /// Paragraph items, only populated for list placeholders.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,

    /// Unqualified shape text; differs from `key` only for duplicates.
    #[serde(skip)]
    pub text: String,
}

impl Placeholder {
    /// Create a text placeholder.
    pub fn text(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            text: key.clone(),
            key,
            kind: PlaceholderKind::Text,
            items: Vec::new(),
        }
    }

    /// Create a list placeholder with its current items.
    pub fn list(key: impl Into<String>, items: Vec<String>) -> Self {
        let key = key.into();
        Self {
            text: key.clone(),
            key,
            kind: PlaceholderKind::List,
            items,
        }
    }

    /// Set the literal shape text behind a qualified key.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// The text the shape actually shows, falling back to the key.
    pub fn literal(&self) -> &str {
        if self.text.is_empty() {
            &self.key
        } else {
            &self.text
        }
    }
}

/// Ordered set of placeholders, in shape traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderSet {
    placeholders: Vec<Placeholder>,
}

impl PlaceholderSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a placeholder.
    ///
    /// Returns `false` and leaves the set unchanged if the key is taken;
    /// callers qualify duplicate keys before inserting.
    pub fn insert(&mut self, placeholder: Placeholder) -> bool {
        if self.contains(&placeholder.key) {
            return false;
        }
        self.placeholders.push(placeholder);
        true
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Look up a placeholder by key.
    pub fn get(&self, key: &str) -> Option<&Placeholder> {
        self.placeholders.iter().find(|p| p.key == key)
    }

    /// Keys in traversal order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(|p| p.key.as_str())
    }

    /// Placeholders in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = &Placeholder> {
        self.placeholders.iter()
    }

    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }
}

impl FromIterator<Placeholder> for PlaceholderSet {
    fn from_iter<I: IntoIterator<Item = Placeholder>>(iter: I) -> Self {
        let mut set = Self::new();
        for placeholder in iter {
            set.insert(placeholder);
        }
        set
    }
}

/// Serialized as the oracle sees it: `key -> {kind, items | value}`,
/// keeping traversal order.
impl Serialize for PlaceholderSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(tag = "kind", rename_all = "lowercase")]
        enum View<'a> {
            Text { value: &'a str },
            List { items: &'a [String] },
        }

        let mut map = serializer.serialize_map(Some(self.placeholders.len()))?;
        for p in &self.placeholders {
            let view = match p.kind {
                PlaceholderKind::Text => View::Text { value: &p.key },
                PlaceholderKind::List => View::List { items: &p.items },
            };
            map.serialize_entry(&p.key, &view)?;
        }
        map.end()
    }
}
