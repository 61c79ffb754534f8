//! Fill pipeline for slide templates.
//!
//! Sequences template fetching, placeholder extraction, one oracle
//! generation, validation, rendering and publishing.

pub mod config;
pub mod oracle;
pub mod orchestrator;
pub mod prompt;
pub mod publish;
pub mod source;

pub use config::PipelineConfig;
pub use oracle::{CannedOracle, CommandOracle, ContentOracle, GenerationRequest, OracleError, ReferenceImage};
pub use orchestrator::{FillOutcome, FillRequest, Orchestrator, PipelineError, PipelineState};
pub use publish::{PublishedArtifact, Publisher};
pub use source::{AssetSource, DefaultSource, FetchedAsset, HttpSource, LocalSource};
