//! The fill pipeline: fetch, extract, generate, validate, render, publish.

use deckfill_core::{Error, Mapping, PlaceholderSet, ResponseValidator};
use deckfill_pptx::{PlaceholderExtractor, SlideDeck, TemplateRenderer};
use serde::Serialize;
use std::fmt;

use crate::config::PipelineConfig;
use crate::oracle::{ContentOracle, GenerationRequest, ReferenceImage};
use crate::publish::{PublishedArtifact, Publisher};
use crate::source::{extension_suffix, AssetSource, DefaultSource};

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Fetched,
    Extracted,
    AwaitingGeneration,
    Validated,
    GenerationMalformed,
    ValidationFailed,
    Rendered,
    Published,
    DownloadFailed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Extracted => "extracted",
            Self::AwaitingGeneration => "awaiting_generation",
            Self::Validated => "validated",
            Self::GenerationMalformed => "generation_malformed",
            Self::ValidationFailed => "validation_failed",
            Self::Rendered => "rendered",
            Self::Published => "published",
            Self::DownloadFailed => "download_failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed run: the state it stopped in and why.
#[derive(thiserror::Error, Debug)]
#[error("pipeline stopped at {state}: {source}")]
pub struct PipelineError {
    pub state: PipelineState,
    #[source]
    pub source: Error,
}

impl PipelineError {
    fn new(state: PipelineState, source: Error) -> Self {
        Self { state, source }
    }

    /// The user-facing description of this failure.
    pub fn report(&self) -> deckfill_core::FailureReport {
        self.source.report()
    }
}

/// One fill request.
#[derive(Debug, Clone)]
pub struct FillRequest {
    /// Template locator.
    pub template: String,
    /// Reference image locator.
    pub image: String,
    /// Free-form content to place on the slide.
    pub content: String,
}

/// A successful run.
#[derive(Debug, Clone, Serialize)]
pub struct FillOutcome {
    pub artifact: PublishedArtifact,
    pub placeholders: PlaceholderSet,
    pub mapping: Mapping,
}

/// Runs fill requests against an oracle and an asset source.
///
/// Runs share no mutable state, so one orchestrator may serve requests
/// from several threads.
pub struct Orchestrator<O, S> {
    oracle: O,
    source: S,
    config: PipelineConfig,
    extractor: PlaceholderExtractor,
    validator: ResponseValidator,
    renderer: TemplateRenderer,
    publisher: Publisher,
}

impl<O: ContentOracle> Orchestrator<O, DefaultSource> {
    /// Orchestrator fetching from local paths and http(s) URLs.
    pub fn with_default_source(oracle: O, config: PipelineConfig) -> deckfill_core::Result<Self> {
        let source = DefaultSource::new(config.fetch_timeout())?;
        Ok(Self::new(oracle, source, config))
    }
}

impl<O: ContentOracle, S: AssetSource> Orchestrator<O, S> {
    pub fn new(oracle: O, source: S, config: PipelineConfig) -> Self {
        let publisher = Publisher::from_config(&config);
        Self {
            oracle,
            source,
            config,
            extractor: PlaceholderExtractor::new(),
            validator: ResponseValidator::new(),
            renderer: TemplateRenderer::new(),
            publisher,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one request to completion.
    ///
    /// The oracle is called at most once. Fetched inputs are removed
    /// before this returns, whatever the outcome.
    pub fn run(&self, request: &FillRequest) -> Result<FillOutcome, PipelineError> {
        use PipelineState::*;

        let slide = self.config.slide_index();

        let template = self
            .source
            .fetch(&request.template, ".pptx")
            .map_err(|e| self.fail(DownloadFailed, e))?;
        let deck = template
            .read_bytes()
            .and_then(|bytes| SlideDeck::from_bytes(&bytes))
            .map_err(|e| self.fail(DownloadFailed, e))?;
        drop(template);
        transition(Fetched);

        let placeholders = self
            .extractor
            .extract(&deck, slide)
            .map_err(|e| self.fail(Fetched, e))?;
        transition(Extracted);
        log::debug!("Placeholders: {:?}", placeholders.keys().collect::<Vec<_>>());

        let image = self
            .source
            .fetch(&request.image, &extension_suffix(&request.image))
            .map_err(|e| self.fail(DownloadFailed, e))?;
        transition(AwaitingGeneration);

        let reference = ReferenceImage::new(image.path());
        let generation = GenerationRequest::new(&request.content, &placeholders, &reference);
        let reply = self
            .oracle
            .generate(&generation)
            .map_err(|e| self.fail(AwaitingGeneration, e.into()))?;
        drop(image);
        log::debug!("Oracle reply: {}", reply);

        let mapping = Mapping::from_reply(&reply).map_err(|e| self.fail(GenerationMalformed, e))?;
        let accepted = mapping.clone();
        let validated = self
            .validator
            .validate(mapping, &placeholders)
            .map_err(|e| self.fail(ValidationFailed, e.into()))?;
        transition(Validated);

        let rendered = self
            .renderer
            .render(&deck, slide, &validated)
            .map_err(|e| self.fail(Validated, e))?;
        transition(Rendered);

        let artifact = self
            .publisher
            .publish(&rendered)
            .map_err(|e| self.fail(Rendered, e))?;
        transition(Published);

        Ok(FillOutcome {
            artifact,
            placeholders,
            mapping: accepted,
        })
    }

    fn fail(&self, state: PipelineState, source: Error) -> PipelineError {
        log::warn!("Pipeline failed at {}: {}", state, source);
        PipelineError::new(state, source)
    }
}

fn transition(state: PipelineState) {
    log::debug!("Pipeline -> {}", state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::CannedOracle;
    use crate::source::LocalSource;
    use deckfill_pptx::fixture;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Env {
        inputs: TempDir,
        staging: TempDir,
        public: TempDir,
    }

    impl Env {
        fn new() -> Self {
            let env = Self {
                inputs: tempfile::tempdir().unwrap(),
                staging: tempfile::tempdir().unwrap(),
                public: tempfile::tempdir().unwrap(),
            };
            let tree = [
                fixture::text_shape(2, "Title"),
                fixture::shape(
                    3,
                    &[
                        fixture::bullet_paragraph("Step one", 1),
                        fixture::bullet_paragraph("Step two", 1),
                    ],
                ),
            ]
            .concat();
            std::fs::write(env.template(), fixture::single_slide_deck(&tree)).unwrap();
            std::fs::write(env.image(), b"\x89PNG\r\n\x1a\n").unwrap();
            env
        }

        fn template(&self) -> PathBuf {
            self.inputs.path().join("template.pptx")
        }

        fn image(&self) -> PathBuf {
            self.inputs.path().join("reference.png")
        }

        fn request(&self) -> FillRequest {
            FillRequest {
                template: self.template().display().to_string(),
                image: format!("file://{}", self.image().display()),
                content: "Q3 review: we planned, then executed.".to_string(),
            }
        }

        fn orchestrator(&self, reply: &str) -> Orchestrator<CannedOracle, LocalSource> {
            let config = PipelineConfig::new()
                .with_publish_dir(self.public.path())
                .with_public_base_url("https://decks.example.com");
            Orchestrator::new(
                CannedOracle::new(reply),
                LocalSource::new().with_temp_dir(self.staging.path()),
                config,
            )
        }

        fn staged_files(&self) -> usize {
            count(self.staging.path())
        }

        fn published_files(&self) -> usize {
            count(self.public.path())
        }
    }

    fn count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    fn good_reply() -> String {
        format!(
            "```json\n{}\n```",
            json!({"Title": "Q3 Review", "Step one\nStep two": ["Plan", "Execute"]})
        )
    }

    #[test]
    fn test_run_publishes_filled_deck() {
        let env = Env::new();
        let orchestrator = env.orchestrator(&good_reply());

        let outcome = orchestrator.run(&env.request()).unwrap();
        assert_eq!(orchestrator.oracle.calls(), 1);
        assert_eq!(outcome.placeholders.len(), 2);
        assert_eq!(outcome.mapping.len(), 2);
        assert_eq!(
            outcome.artifact.url.as_deref(),
            Some(format!("https://decks.example.com/{}", outcome.artifact.name).as_str())
        );

        let published = SlideDeck::from_bytes(&std::fs::read(&outcome.artifact.path).unwrap()).unwrap();
        let filled = PlaceholderExtractor::new().extract(&published, 0).unwrap();
        assert_eq!(filled.keys().collect::<Vec<_>>(), vec!["Q3 Review", "Plan\nExecute"]);

        // The oracle saw the template's placeholders and the staged image.
        let sent: serde_json::Value = serde_json::from_str(&orchestrator.oracle.requests()[0]).unwrap();
        assert_eq!(sent["placeholders"]["Step one\nStep two"]["kind"], "list");
        assert_eq!(sent["image"]["media_type"], "image/png");

        assert_eq!(env.staged_files(), 0);
        assert_eq!(env.published_files(), 1);
        assert!(env.template().exists());
    }

    #[test]
    fn test_malformed_reply_stops_without_publishing() {
        let env = Env::new();
        let orchestrator = env.orchestrator("Sure! Here is your JSON: {\"Title\": \"Q3\"}");

        let err = orchestrator.run(&env.request()).unwrap_err();
        assert_eq!(err.state, PipelineState::GenerationMalformed);
        assert_eq!(err.report().kind, "generation_malformed");
        assert_eq!(orchestrator.oracle.calls(), 1);
        assert_eq!(env.staged_files(), 0);
        assert_eq!(env.published_files(), 0);
    }

    #[test]
    fn test_declined_reply_is_reported() {
        let env = Env::new();
        let orchestrator = env.orchestrator(r#"{"error": "Not enough content for this slide"}"#);

        let err = orchestrator.run(&env.request()).unwrap_err();
        assert_eq!(err.state, PipelineState::ValidationFailed);
        assert!(matches!(err.source, Error::GenerationDeclined(_)));
        assert_eq!(
            err.report().message,
            "The provided content is not sufficient to fill this template."
        );
        assert_eq!(env.published_files(), 0);
    }

    #[test]
    fn test_key_count_mismatch_fails_validation() {
        let env = Env::new();
        let orchestrator = env.orchestrator(r#"{"Title": "Q3 Review"}"#);

        let err = orchestrator.run(&env.request()).unwrap_err();
        assert_eq!(err.state, PipelineState::ValidationFailed);
        assert_eq!(err.report().kind, "validation_failed");
        assert_eq!(env.staged_files(), 0);
    }

    #[test]
    fn test_missing_template_never_calls_oracle() {
        let env = Env::new();
        let orchestrator = env.orchestrator(&good_reply());
        let mut request = env.request();
        request.template = env.inputs.path().join("missing.pptx").display().to_string();

        let err = orchestrator.run(&request).unwrap_err();
        assert_eq!(err.state, PipelineState::DownloadFailed);
        assert_eq!(err.report().kind, "fetch_failed");
        assert_eq!(orchestrator.oracle.calls(), 0);
        assert_eq!(env.staged_files(), 0);
    }

    #[test]
    fn test_missing_image_never_calls_oracle() {
        let env = Env::new();
        let orchestrator = env.orchestrator(&good_reply());
        let mut request = env.request();
        request.image = "file:///definitely/not/here.png".to_string();

        let err = orchestrator.run(&request).unwrap_err();
        assert_eq!(err.state, PipelineState::DownloadFailed);
        assert_eq!(orchestrator.oracle.calls(), 0);
        assert_eq!(env.staged_files(), 0);
    }

    #[test]
    fn test_unreadable_template_is_download_failure() {
        let env = Env::new();
        std::fs::write(env.template(), b"not a zip").unwrap();
        let orchestrator = env.orchestrator(&good_reply());

        let err = orchestrator.run(&env.request()).unwrap_err();
        assert_eq!(err.state, PipelineState::DownloadFailed);
        assert_eq!(err.report().kind, "invalid_template");
        assert_eq!(orchestrator.oracle.calls(), 0);
    }

    #[test]
    fn test_missing_slide_stops_after_fetch() {
        let env = Env::new();
        let config = PipelineConfig::new()
            .with_publish_dir(env.public.path())
            .with_slide_index(4);
        let orchestrator = Orchestrator::new(
            CannedOracle::new(good_reply()),
            LocalSource::new().with_temp_dir(env.staging.path()),
            config,
        );

        let err = orchestrator.run(&env.request()).unwrap_err();
        assert_eq!(err.state, PipelineState::Fetched);
        assert!(matches!(err.source, Error::SlideNotFound { index: 4, count: 1 }));
        assert_eq!(orchestrator.oracle.calls(), 0);
    }

    #[test]
    fn test_concurrent_runs_publish_distinct_artifacts() {
        let env = Env::new();
        let orchestrator = env.orchestrator(&good_reply());
        let request = env.request();

        let names: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| orchestrator.run(&request).unwrap().artifact.name))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        assert_eq!(orchestrator.oracle.calls(), 4);
        assert_eq!(env.published_files(), 4);
        assert_eq!(env.staged_files(), 0);
    }

    #[test]
    fn test_state_names_are_snake_case() {
        assert_eq!(
            serde_json::to_value(PipelineState::AwaitingGeneration).unwrap(),
            json!("awaiting_generation")
        );
        assert_eq!(PipelineState::DownloadFailed.to_string(), "download_failed");
    }
}
