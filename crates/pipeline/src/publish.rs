//! Publishing rendered decks under unique names.

use deckfill_core::{Error, Result};
use deckfill_pptx::SlideDeck;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::PipelineConfig;

/// A published deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    /// File name, `<prefix>-<uuid>.pptx`.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Public URL, when a base URL is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Writes decks into the publish directory.
#[derive(Debug, Clone)]
pub struct Publisher {
    dir: PathBuf,
    base_url: Option<String>,
    prefix: String,
}

impl Publisher {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            dir: config.publish_dir().to_path_buf(),
            base_url: config.public_base_url().map(str::to_string),
            prefix: config.artifact_prefix().to_string(),
        }
    }

    /// Publish `deck`.
    ///
    /// The deck is staged next to its destination and moved into place
    /// once fully written, so readers never see a partial file and an
    /// existing file is never replaced.
    pub fn publish(&self, deck: &SlideDeck) -> Result<PublishedArtifact> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::PublishError(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        let mut staged = tempfile::Builder::new()
            .prefix(".staging-")
            .suffix(".pptx")
            .tempfile_in(&self.dir)
            .map_err(|e| Error::PublishError(format!("cannot stage deck: {}", e)))?;

        deck.write_to(staged.as_file_mut())?;
        staged.as_file_mut().flush()?;

        let name = format!("{}-{}.pptx", self.prefix, Uuid::new_v4());
        let path = self.dir.join(&name);
        staged
            .persist_noclobber(&path)
            .map_err(|e| Error::PublishError(format!("cannot publish {}: {}", name, e.error)))?;

        let url = self.base_url.as_ref().map(|base| format!("{}/{}", base, name));
        log::info!("Published {}", path.display());

        Ok(PublishedArtifact { name, path, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckfill_pptx::fixture;

    fn deck() -> SlideDeck {
        SlideDeck::from_bytes(&fixture::single_slide_deck(&fixture::text_shape(2, "Title"))).unwrap()
    }

    #[test]
    fn test_publish_writes_unique_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new()
            .with_publish_dir(dir.path().join("public"))
            .with_public_base_url("https://decks.example.com/");
        let publisher = Publisher::from_config(&config);

        let first = publisher.publish(&deck()).unwrap();
        let second = publisher.publish(&deck()).unwrap();

        assert_ne!(first.name, second.name);
        assert!(first.name.starts_with("presentation-"));
        assert!(first.name.ends_with(".pptx"));
        assert_eq!(
            first.url.as_deref(),
            Some(format!("https://decks.example.com/{}", first.name).as_str())
        );

        let published = std::fs::read(&first.path).unwrap();
        assert_eq!(published, deck().to_bytes().unwrap());

        // Only the two artifacts remain; no staging files are left behind.
        assert_eq!(std::fs::read_dir(dir.path().join("public")).unwrap().count(), 2);
    }

    #[test]
    fn test_publish_without_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new()
            .with_publish_dir(dir.path())
            .with_artifact_prefix("q3-review");

        let artifact = Publisher::from_config(&config).publish(&deck()).unwrap();
        assert!(artifact.name.starts_with("q3-review-"));
        assert_eq!(artifact.url, None);
        assert!(artifact.path.exists());
    }
}
