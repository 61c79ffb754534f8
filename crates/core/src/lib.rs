//! Core domain types, oracle-reply parsing and mapping validation
//! for filling slide templates.

pub mod error;
pub mod mapping;
pub mod normalize;
pub mod types;
pub mod validate;

pub use error::{Error, FailureReport, Result};
pub use mapping::{FillValue, Mapping};
pub use types::{Placeholder, PlaceholderKind, PlaceholderSet};
pub use validate::{ResponseValidator, ValidatedMapping, ValidationError};
