//! Diagnostics
//!
//! Every operation of the interaction layer reports what it did through a
//! [`Diagnostics`] collaborator handed to the page at construction time.
//! [`TracingDiagnostics`] turns events into log records; [`MemoryDiagnostics`]
//! additionally keeps them (and any failure artifacts) for a test report.

use std::path::Path;
use std::sync::Mutex;

use base64::Engine as _;
use serde::Serialize;

use crate::capture::FailureArtifact;
use crate::error::Result;

/// Something the interaction layer did or observed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    LocateAttempt {
        selector: String,
        attempt: u32,
    },
    LocateRetry {
        selector: String,
        attempt: u32,
        error: String,
    },
    Located {
        selector: String,
        attempt: u32,
    },
    LocateExhausted {
        selector: String,
        attempts: u32,
        error: String,
    },
    StabilityReset {
        selector: String,
        stable_count: u32,
        reason: String,
    },
    Stable {
        selector: String,
        samples: u32,
    },
    Navigated {
        url: String,
        elapsed_ms: u64,
    },
    ActionPerformed {
        operation: String,
        selector: String,
    },
    ActionFailed {
        operation: String,
        selector: String,
        error: String,
    },
    ArtifactSaved {
        path: String,
    },
    CaptureFailed {
        operation: String,
        error: String,
    },
}

/// Sink for diagnostic events and failure artifacts
pub trait Diagnostics: Send + Sync {
    fn record(&self, event: DiagnosticEvent);

    /// Attach a failure artifact to whatever report the sink maintains
    fn attach(&self, artifact: &FailureArtifact);
}

/// Emit an event as a `tracing` record at the severity it deserves
fn trace_event(event: &DiagnosticEvent) {
    match event {
        DiagnosticEvent::LocateAttempt { selector, attempt } => {
            tracing::debug!(selector = %selector, attempt, "Locating element");
        }
        DiagnosticEvent::LocateRetry {
            selector,
            attempt,
            error,
        } => {
            tracing::warn!(selector = %selector, attempt, "Locate failed, retrying: {}", error);
        }
        DiagnosticEvent::Located { selector, attempt } => {
            tracing::debug!(selector = %selector, attempt, "Element located");
        }
        DiagnosticEvent::LocateExhausted {
            selector,
            attempts,
            error,
        } => {
            tracing::error!(selector = %selector, attempts, "Locate retries exhausted: {}", error);
        }
        DiagnosticEvent::StabilityReset {
            selector,
            stable_count,
            reason,
        } => {
            tracing::trace!(selector = %selector, stable_count, "Stability reset: {}", reason);
        }
        DiagnosticEvent::Stable { selector, samples } => {
            tracing::debug!(selector = %selector, samples, "Element stable");
        }
        DiagnosticEvent::Navigated { url, elapsed_ms } => {
            tracing::info!(url = %url, elapsed_ms, "Page loaded");
        }
        DiagnosticEvent::ActionPerformed {
            operation,
            selector,
        } => {
            tracing::info!(operation = %operation, selector = %selector, "Action performed");
        }
        DiagnosticEvent::ActionFailed {
            operation,
            selector,
            error,
        } => {
            tracing::error!(operation = %operation, selector = %selector, "Action failed: {}", error);
        }
        DiagnosticEvent::ArtifactSaved { path } => {
            tracing::info!(path = %path, "Screenshot saved");
        }
        DiagnosticEvent::CaptureFailed { operation, error } => {
            tracing::error!(operation = %operation, "Screenshot capture failed: {}", error);
        }
    }
}

/// Diagnostics that only log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        trace_event(&event);
    }

    fn attach(&self, artifact: &FailureArtifact) {
        tracing::info!(
            operation = %artifact.operation,
            path = %artifact.screenshot_path.display(),
            "Failure artifact attached"
        );
    }
}

/// Diagnostics that log and keep everything for a report
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
    artifacts: Mutex<Vec<FailureArtifact>>,
}

#[derive(Serialize)]
struct Report<'a> {
    events: &'a [DiagnosticEvent],
    artifacts: Vec<ReportArtifact<'a>>,
}

/// An artifact with its screenshot inlined; `null` when the file is gone
#[derive(Serialize)]
struct ReportArtifact<'a> {
    #[serde(flatten)]
    artifact: &'a FailureArtifact,
    png_base64: Option<String>,
}

impl<'a> ReportArtifact<'a> {
    fn new(artifact: &'a FailureArtifact) -> Self {
        let png_base64 = artifact
            .read_png()
            .ok()
            .map(|png| base64::engine::general_purpose::STANDARD.encode(png));
        Self {
            artifact,
            png_base64,
        }
    }
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Snapshot of attached artifacts, oldest first
    pub fn artifacts(&self) -> Vec<FailureArtifact> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Write events and artifacts as pretty JSON
    pub fn write_report(&self, path: impl AsRef<Path>) -> Result<()> {
        let events = self.events();
        let artifacts = self.artifacts();
        let json = serde_json::to_string_pretty(&Report {
            events: &events,
            artifacts: artifacts.iter().map(ReportArtifact::new).collect(),
        })?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn record(&self, event: DiagnosticEvent) {
        trace_event(&event);
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    fn attach(&self, artifact: &FailureArtifact) {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(artifact.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_memory_diagnostics_keeps_order() {
        let diag = MemoryDiagnostics::new();
        diag.record(DiagnosticEvent::LocateAttempt {
            selector: "#a".into(),
            attempt: 1,
        });
        diag.record(DiagnosticEvent::Located {
            selector: "#a".into(),
            attempt: 1,
        });

        let events = diag.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], DiagnosticEvent::Located { attempt: 1, .. }));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let diag = MemoryDiagnostics::new();
        diag.record(DiagnosticEvent::Navigated {
            url: "https://shop.test/".into(),
            elapsed_ms: 42,
        });
        diag.attach(&FailureArtifact {
            screenshot_path: PathBuf::from("output/screenshots/click_error_1.png"),
            timestamp: "20240101_000000_000".into(),
            operation: "click_error_1".into(),
            selector: Some("#submit".into()),
        });

        let path = dir.path().join("reports").join("run.json");
        diag.write_report(&path).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["events"][0]["event"], "navigated");
        assert_eq!(report["events"][0]["elapsed_ms"], 42);
        assert_eq!(report["artifacts"][0]["selector"], "#submit");
        assert!(report["artifacts"][0]["png_base64"].is_null());
    }

    #[test]
    fn test_report_inlines_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("click_error_1.png");
        std::fs::write(&png, [0x89, b'P', b'N', b'G']).unwrap();
        let diag = MemoryDiagnostics::new();
        diag.attach(&FailureArtifact {
            screenshot_path: png,
            timestamp: "20240101_000000_000".into(),
            operation: "click_error_1".into(),
            selector: None,
        });

        let path = dir.path().join("run.json");
        diag.write_report(&path).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["artifacts"][0]["png_base64"], "iVBORw==");
        assert_eq!(report["artifacts"][0]["operation"], "click_error_1");
    }
}
