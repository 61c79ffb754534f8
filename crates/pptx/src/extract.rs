//! Placeholder extraction from a template slide.

use deckfill_core::{Placeholder, PlaceholderKind, PlaceholderSet, Result};

use crate::package::SlideDeck;
use crate::slide::text_shapes;

/// Reads the text shapes of one slide into an ordered placeholder set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExtractor;

impl PlaceholderExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract placeholders from the slide at a 0-based position.
    pub fn extract(&self, deck: &SlideDeck, slide_index: usize) -> Result<PlaceholderSet> {
        let doc = deck.slide_xml(slide_index)?;

        let mut set = PlaceholderSet::new();
        for shape in text_shapes(&doc.root) {
            let placeholder = match shape.inferred_kind() {
                PlaceholderKind::List => Placeholder::list(shape.key.clone(), shape.items()),
                PlaceholderKind::Text => Placeholder::text(shape.key.clone()),
            }
            .with_text(shape.text.clone());
            log::debug!("Placeholder {:?} ({:?})", placeholder.key, placeholder.kind);
            set.insert(placeholder);
        }

        log::debug!("Extracted {} placeholders from slide {}", set.len(), slide_index);
        Ok(set)
    }
}
