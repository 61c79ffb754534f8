//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by every request an orchestrator handles.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 0-based slide addressed in the template.
    slide_index: usize,

    /// Directory rendered decks are published into.
    publish_dir: PathBuf,

    /// Public URL the publish directory is served under, if any.
    public_base_url: Option<String>,

    /// File name prefix for published decks.
    artifact_prefix: String,

    /// Timeout for fetching remote templates and images.
    fetch_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slide_index: 0,
            publish_dir: PathBuf::from("public"),
            public_base_url: None,
            artifact_prefix: "presentation".to_string(),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with defaults (slide 0, `./public`).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slide_index(mut self, index: usize) -> Self {
        self.slide_index = index;
        self
    }

    pub fn with_publish_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.publish_dir = dir.into();
        self
    }

    /// Set the public base URL; a trailing slash is ignored.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.public_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        if !prefix.trim().is_empty() {
            self.artifact_prefix = prefix;
        }
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn slide_index(&self) -> usize {
        self.slide_index
    }

    pub fn publish_dir(&self) -> &Path {
        &self.publish_dir
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }

    pub fn artifact_prefix(&self) -> &str {
        &self.artifact_prefix
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }
}
