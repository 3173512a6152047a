//! Failure Capture
//!
//! Saves a full-page screenshot when an operation fails and hands the
//! resulting artifact to the diagnostics sink. Capture never fails the caller:
//! problems writing the screenshot are recorded and swallowed so the original
//! error is the one that surfaces.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::engine::Engine;
use crate::error::Result;

/// Disambiguates artifacts whose tag and timestamp collide
static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Default directory for failure screenshots
pub const DEFAULT_SCREENSHOT_DIR: &str = "output/screenshots";

/// A screenshot taken because an operation failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureArtifact {
    pub screenshot_path: PathBuf,
    /// Local time the screenshot was taken, `YYYYmmdd_HHMMSS_mmm`
    pub timestamp: String,
    /// Tag of the failed operation, e.g. `click_error_1718000000`
    pub operation: String,
    pub selector: Option<String>,
}

impl FailureArtifact {
    /// Read the PNG back, e.g. to embed it in a report
    pub fn read_png(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.screenshot_path)?)
    }
}

/// Tag for a failed operation: `<operation>_error_<unix seconds>`
pub fn error_tag(operation: &str) -> String {
    format!("{}_error_{}", operation, chrono::Utc::now().timestamp())
}

/// Tag with an arbitrary prefix: `<prefix>_<unix seconds>`
pub fn timestamped_tag(prefix: &str) -> String {
    format!("{}_{}", prefix, chrono::Utc::now().timestamp())
}

/// Writes failure screenshots under a fixed directory
#[derive(Debug, Clone)]
pub struct FailureCapture {
    dir: PathBuf,
}

impl Default for FailureCapture {
    fn default() -> Self {
        Self::new(DEFAULT_SCREENSHOT_DIR)
    }
}

impl FailureCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Take a full-page screenshot tagged `tag`
    ///
    /// Returns `None` when the screenshot could not be taken or written; the
    /// failure is reported to `diagnostics` instead.
    pub async fn capture<E>(
        &self,
        engine: &E,
        diagnostics: &dyn Diagnostics,
        tag: &str,
        selector: Option<&str>,
    ) -> Option<FailureArtifact>
    where
        E: Engine + ?Sized,
    {
        match self.try_capture(engine, tag, selector).await {
            Ok(artifact) => {
                diagnostics.record(DiagnosticEvent::ArtifactSaved {
                    path: artifact.screenshot_path.display().to_string(),
                });
                diagnostics.attach(&artifact);
                Some(artifact)
            }
            Err(e) => {
                diagnostics.record(DiagnosticEvent::CaptureFailed {
                    operation: tag.to_string(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    async fn try_capture<E>(
        &self,
        engine: &E,
        tag: &str,
        selector: Option<&str>,
    ) -> Result<FailureArtifact>
    where
        E: Engine + ?Sized,
    {
        std::fs::create_dir_all(&self.dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let png = engine.screenshot(true).await?;
        let path = write_new(&self.dir, &format!("{}_{}", tag, timestamp), &png)?;

        Ok(FailureArtifact {
            screenshot_path: path,
            timestamp,
            operation: tag.to_string(),
            selector: selector.map(String::from),
        })
    }
}

/// Write `bytes` to `{stem}.png`, or `{stem}_{n}.png` if that name is taken
///
/// Existing files are never overwritten.
fn write_new(dir: &Path, stem: &str, bytes: &[u8]) -> Result<PathBuf> {
    let mut path = dir.join(format!("{}.png", stem));
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let n = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
                path = dir.join(format!("{}_{}.png", stem, n));
            }
            Err(e) => return Err(e.into()),
        }
    }
}
