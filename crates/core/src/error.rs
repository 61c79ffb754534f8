//! Error types for template filling.

use serde::Serialize;
use thiserror::Error;

use crate::validate::ValidationError;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while filling a slide template.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read a local file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The template or reference image could not be fetched.
    #[error("Fetch failed for '{locator}': {reason}")]
    FetchError { locator: String, reason: String },

    /// The oracle reply was not exactly one JSON object.
    #[error("Malformed generation output: {0}")]
    GenerationMalformed(String),

    /// The oracle explicitly declined to fill the template.
    #[error("Generation declined: {0}")]
    GenerationDeclined(String),

    /// The oracle mapping failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    /// A mapping value could not be written back into the slide.
    #[error("Render error for '{key}': {reason}")]
    RenderError { key: String, reason: String },

    /// The oracle collaborator itself failed (spawn, transport, exit status).
    #[error("Oracle call failed: {0}")]
    OracleError(String),

    /// The rendered deck could not be published.
    #[error("Publish failed: {0}")]
    PublishError(String),

    /// The requested slide does not exist in the deck.
    #[error("Slide {index} not found (deck has {count} slides)")]
    SlideNotFound { index: usize, count: usize },

    /// The package is not a usable PPTX document.
    #[error("Invalid presentation package: {0}")]
    InvalidPackage(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    XmlError(String),
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Declined(reason) => Self::GenerationDeclined(reason),
            other => Self::Validation(other),
        }
    }
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchError { .. } => "fetch_failed",
            Self::GenerationMalformed(_) => "generation_malformed",
            Self::GenerationDeclined(_) => "generation_declined",
            Self::Validation(_) => "validation_failed",
            Self::RenderError { .. } => "render_failed",
            Self::OracleError(_) => "oracle_failed",
            Self::PublishError(_) => "publish_failed",
            Self::SlideNotFound { .. } => "slide_not_found",
            Self::IoError(_) | Self::InvalidPackage(_) | Self::ZipError(_) | Self::XmlError(_) => {
                "invalid_template"
            }
        }
    }

    /// Build the user-facing description of this error.
    ///
    /// Messages are fixed per kind; internal detail (paths, parser
    /// positions, oracle output) stays in the logs.
    pub fn report(&self) -> FailureReport {
        let message = match self {
            Self::FetchError { .. } => "The template or reference image could not be downloaded.",
            Self::GenerationMalformed(_) => "The content generator returned an unreadable answer.",
            Self::GenerationDeclined(_) => {
                "The provided content is not sufficient to fill this template."
            }
            Self::Validation(_) => "The generated content did not match the template placeholders.",
            Self::RenderError { .. } => "The generated content could not be written into the template.",
            Self::OracleError(_) => "The content generator is unavailable.",
            Self::PublishError(_) => "The filled presentation could not be saved.",
            Self::SlideNotFound { .. } => "The template does not contain the requested slide.",
            Self::IoError(_) | Self::InvalidPackage(_) | Self::ZipError(_) | Self::XmlError(_) => {
                "The template is not a readable PowerPoint file."
            }
        };

        FailureReport {
            kind: self.kind(),
            message: message.to_string(),
        }
    }
}

/// Structured failure returned to callers in place of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub kind: &'static str,
    pub message: String,
}
