//! Fetching templates and reference images into scoped temporary files.
//!
//! Every fetched asset lives in a [`FetchedAsset`] that deletes its file
//! when dropped, so temporary inputs never outlive the request.

use deckfill_core::{Error, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// A fetched file, removed from disk on drop.
#[derive(Debug)]
pub struct FetchedAsset {
    locator: String,
    file: NamedTempFile,
}

impl FetchedAsset {
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.file.path())?)
    }
}

/// Resolves opaque locators to local temporary copies.
pub trait AssetSource: Send + Sync {
    /// Fetch `locator` into a temporary file ending in `suffix`.
    fn fetch(&self, locator: &str, suffix: &str) -> Result<FetchedAsset>;
}

/// Where fetched assets are staged.
#[derive(Debug, Clone, Default)]
struct Staging {
    dir: Option<PathBuf>,
}

impl Staging {
    fn create(&self, locator: &str, suffix: &str) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("deckfill-").suffix(suffix);
        let created = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        created.map_err(|e| fetch_error(locator, format!("cannot stage file: {}", e)))
    }
}

/// Local paths and `file://` locators.
#[derive(Debug, Clone, Default)]
pub struct LocalSource {
    staging: Staging,
}

impl LocalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage fetched copies in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging.dir = Some(dir.into());
        self
    }
}

impl AssetSource for LocalSource {
    fn fetch(&self, locator: &str, suffix: &str) -> Result<FetchedAsset> {
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        let mut source = File::open(path).map_err(|e| fetch_error(locator, e))?;

        let mut file = self.staging.create(locator, suffix)?;
        io::copy(&mut source, file.as_file_mut()).map_err(|e| fetch_error(locator, e))?;
        file.as_file_mut().flush()?;

        log::debug!("Staged {} at {}", locator, file.path().display());
        Ok(FetchedAsset {
            locator: locator.to_string(),
            file,
        })
    }
}

/// `http://` and `https://` locators.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
    staging: Staging,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| fetch_error("http client", e))?;
        Ok(Self {
            client,
            staging: Staging::default(),
        })
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging.dir = Some(dir.into());
        self
    }
}

impl AssetSource for HttpSource {
    fn fetch(&self, locator: &str, suffix: &str) -> Result<FetchedAsset> {
        let response = self
            .client
            .get(locator)
            .send()
            .map_err(|e| fetch_error(locator, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(locator, format!("HTTP {}", status)));
        }

        let body = response.bytes().map_err(|e| fetch_error(locator, e))?;

        let mut file = self.staging.create(locator, suffix)?;
        file.write_all(&body)?;
        file.flush()?;

        log::debug!("Downloaded {} ({} bytes)", locator, body.len());
        Ok(FetchedAsset {
            locator: locator.to_string(),
            file,
        })
    }
}

/// Dispatches on the locator scheme.
#[derive(Debug, Clone)]
pub struct DefaultSource {
    local: LocalSource,
    http: HttpSource,
}

impl DefaultSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            local: LocalSource::new(),
            http: HttpSource::new(timeout)?,
        })
    }

    pub fn with_temp_dir(self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            local: self.local.with_temp_dir(dir.clone()),
            http: self.http.with_temp_dir(dir),
        }
    }
}

impl AssetSource for DefaultSource {
    fn fetch(&self, locator: &str, suffix: &str) -> Result<FetchedAsset> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            self.http.fetch(locator, suffix)
        } else {
            self.local.fetch(locator, suffix)
        }
    }
}

/// Temp-file suffix carrying the locator's extension, e.g. `.png`.
///
/// Query strings and fragments are ignored; locators without an
/// extension get no suffix.
pub fn extension_suffix(locator: &str) -> String {
    let path = locator
        .split(['?', '#'])
        .next()
        .unwrap_or(locator);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

fn fetch_error(locator: &str, reason: impl std::fmt::Display) -> Error {
    Error::FetchError {
        locator: locator.to_string(),
        reason: reason.to_string(),
    }
}
