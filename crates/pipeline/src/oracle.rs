//! The content-generation oracle boundary.
//!
//! The pipeline only sees [`ContentOracle`]: one request in, raw reply
//! text out. Implementations own transport, credentials and timeouts.

use deckfill_core::{Error, PlaceholderSet};
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failures of an oracle implementation.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The oracle process could not be started or talked to.
    #[error("I/O error talking to oracle: {0}")]
    Io(#[from] std::io::Error),

    /// The oracle process exited unsuccessfully.
    #[error("oracle exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The oracle did not answer in time.
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<OracleError> for Error {
    fn from(err: OracleError) -> Self {
        Error::OracleError(err.to_string())
    }
}

/// Reference image handed to the oracle alongside the content.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub media_type: String,
}

impl ReferenceImage {
    /// Describe an image file, deriving the media type from its extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let media_type = media_type_for(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default(),
        );
        Self {
            path,
            media_type: media_type.to_string(),
        }
    }
}

/// One generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest<'a> {
    /// Free-form user content.
    pub content: &'a str,
    /// Placeholders, serialized as `key -> {kind, items | value}`.
    pub placeholders: &'a PlaceholderSet,
    pub image: &'a ReferenceImage,
    /// Ready-made instructions for prompt-driven oracles.
    pub prompt: String,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(content: &'a str, placeholders: &'a PlaceholderSet, image: &'a ReferenceImage) -> Self {
        Self {
            content,
            placeholders,
            image,
            prompt: crate::prompt::build_prompt(content, placeholders),
        }
    }
}

/// An external content generator.
pub trait ContentOracle: Send + Sync {
    /// Perform one generation. Called once per pipeline run, never retried.
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, OracleError>;
}

impl<T: ContentOracle + ?Sized> ContentOracle for Box<T> {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, OracleError> {
        (**self).generate(request)
    }
}

/// Oracle returning a fixed reply, recording the requests it receives.
///
/// Used as a test double and to replay a saved reply offline.
#[derive(Debug, Default)]
pub struct CannedOracle {
    reply: String,
    requests: Mutex<Vec<String>>,
}

impl CannedOracle {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Received requests as JSON, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ContentOracle for CannedOracle {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, OracleError> {
        let encoded = serde_json::to_string(request)?;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(encoded);
        }
        Ok(self.reply.clone())
    }
}

/// Oracle backed by an external program.
///
/// The request is written to the program's stdin as JSON; its stdout is
/// the reply. A non-zero exit status is a failure.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kill the program if it has not finished within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ContentOracle for CommandOracle {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, OracleError> {
        let payload = serde_json::to_vec(request)?;

        log::debug!("Spawning oracle command {:?}", self.program);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Every pipe gets its own thread so a child that stops reading or
        // writes a lot cannot stall the timeout loop.
        let stdin = child.stdin.take().map(|mut input| {
            thread::spawn(move || match input.write_all(&payload) {
                // The child may answer without reading the whole request.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });
        let stdout = child.stdout.take().map(|mut out| {
            thread::spawn(move || {
                let mut buf = String::new();
                out.read_to_string(&mut buf).map(|_| buf)
            })
        });
        let stderr = child.stderr.take().map(|mut err| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = err.read_to_string(&mut buf);
                buf
            })
        });

        let status = match wait_with_timeout(&mut child, self.timeout) {
            Ok(status) => status,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        if let Some(handle) = stdin {
            handle
                .join()
                .map_err(|_| std::io::Error::other("stdin writer panicked"))??;
        }
        let reply = match stdout {
            Some(handle) => handle
                .join()
                .map_err(|_| std::io::Error::other("stdout reader panicked"))??,
            None => String::new(),
        };
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(OracleError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(reply)
    }
}

/// Poll `child` until it exits or `timeout` elapses.
fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, OracleError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                return Err(OracleError::Timeout(timeout));
            }
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Media type for an image file extension.
pub fn media_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
