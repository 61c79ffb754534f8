//! PPTX (Office Open XML) backend: placeholder extraction and
//! formatting-preserving template rendering.
//!
//! Decks are ZIP archives of XML parts. The addressed slide is parsed
//! into a small element tree, edited, and written back into a copy of
//! the package.

pub mod extract;
pub mod package;
pub mod render;
mod slide;
pub mod xml;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;

pub use extract::PlaceholderExtractor;
pub use package::SlideDeck;
pub use render::TemplateRenderer;
