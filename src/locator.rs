//! Element Locator & Stability Gate
//!
//! [`Locator`] turns a selector into a visible element handle, retrying
//! transient lookup failures within a [`RetryBudget`]. [`StabilityGate`] then
//! samples the handle's layout box until it has stopped moving, so a click
//! never lands on an element that is still animating into place.

use std::time::Duration;

use tokio::time::Instant;

use crate::capture::{timestamped_tag, FailureCapture};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::engine::{BoundingRect, Engine};
use crate::error::{Error, Result};

/// How many times to look for an element and how long to pause in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(1),
        }
    }
}

impl RetryBudget {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

/// Sampling parameters for the stability gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityConfig {
    pub check_interval: Duration,
    /// Consecutive matching samples required
    pub threshold: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(100),
            threshold: 3,
        }
    }
}

/// Accumulator for consecutive matching layout samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StabilityState {
    pub stable_count: u32,
    pub last_rect: Option<BoundingRect>,
}

impl StabilityState {
    /// Fold one sample into the state
    ///
    /// `None` means the element is currently not rendered.
    pub fn observe(&mut self, sample: Option<BoundingRect>) {
        match (sample, self.last_rect) {
            (None, _) => self.stable_count = 0,
            (Some(rect), None) => {
                self.last_rect = Some(rect);
                self.stable_count = 1;
            }
            (Some(rect), Some(last)) if rect.approx_eq(&last) => self.stable_count += 1,
            (Some(rect), Some(_)) => {
                self.last_rect = Some(rect);
                self.stable_count = 1;
            }
        }
    }

    /// A sample could not be taken at all
    pub fn reset(&mut self) {
        self.stable_count = 0;
    }
}

/// Resolves selectors to visible handles within a retry budget
pub struct Locator<'a, E: Engine> {
    engine: &'a E,
    budget: RetryBudget,
    capture: &'a FailureCapture,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a, E: Engine> Locator<'a, E> {
    pub fn new(
        engine: &'a E,
        budget: RetryBudget,
        capture: &'a FailureCapture,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            engine,
            budget,
            capture,
            diagnostics,
        }
    }

    /// Find the first visible match of `selector`
    ///
    /// Each attempt waits up to `timeout` for visibility. Exhausting the budget
    /// saves an `element_not_found_*` screenshot and returns
    /// [`Error::LocateTimeout`].
    pub async fn locate(&self, selector: &str, timeout: Duration) -> Result<E::Handle> {
        let attempts = self.budget.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            self.diagnostics.record(DiagnosticEvent::LocateAttempt {
                selector: selector.to_string(),
                attempt,
            });

            match self.engine.wait_for_visible(selector, timeout).await {
                Ok(handle) => {
                    self.diagnostics.record(DiagnosticEvent::Located {
                        selector: selector.to_string(),
                        attempt,
                    });
                    return Ok(handle);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        self.diagnostics.record(DiagnosticEvent::LocateRetry {
                            selector: selector.to_string(),
                            attempt,
                            error: last_error.clone(),
                        });
                        tokio::time::sleep(self.budget.interval).await;
                    }
                }
            }
        }

        self.diagnostics.record(DiagnosticEvent::LocateExhausted {
            selector: selector.to_string(),
            attempts,
            error: last_error.clone(),
        });
        self.capture
            .capture(
                self.engine,
                self.diagnostics,
                &timestamped_tag("element_not_found"),
                Some(selector),
            )
            .await;

        Err(Error::LocateTimeout {
            selector: selector.to_string(),
            attempts,
            last_error,
        })
    }
}

/// Blocks until an element's layout box has stopped changing
pub struct StabilityGate<'a, E: Engine> {
    engine: &'a E,
    config: StabilityConfig,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a, E: Engine> StabilityGate<'a, E> {
    pub fn new(engine: &'a E, config: StabilityConfig, diagnostics: &'a dyn Diagnostics) -> Self {
        Self {
            engine,
            config,
            diagnostics,
        }
    }

    /// Sample `handle` until `threshold` consecutive samples agree
    ///
    /// Absent or unreadable geometry resets the count rather than failing, so
    /// a node that is briefly re-rendered does not abort the wait. The wait
    /// gives up with [`Error::StabilityTimeout`] once `timeout` has elapsed.
    pub async fn await_stable(
        &self,
        handle: &E::Handle,
        selector: &str,
        timeout: Duration,
    ) -> Result<()> {
        let start = Instant::now();
        let mut state = StabilityState::default();
        let mut samples = 0u32;

        while state.stable_count < self.config.threshold {
            if start.elapsed() >= timeout {
                return Err(Error::StabilityTimeout {
                    selector: selector.to_string(),
                    waited_ms: start.elapsed().as_millis() as u64,
                    stable_count: state.stable_count,
                });
            }

            let before = state.stable_count;
            let reason = match self.engine.bounding_rect(handle).await {
                Ok(sample) => {
                    state.observe(sample);
                    match sample {
                        None => Some("not rendered".to_string()),
                        Some(_) if state.stable_count == 1 && before > 0 => {
                            Some("moved".to_string())
                        }
                        Some(_) => None,
                    }
                }
                Err(e) => {
                    state.reset();
                    Some(e.to_string())
                }
            };
            samples += 1;

            if let Some(reason) = reason {
                if before > 0 {
                    self.diagnostics.record(DiagnosticEvent::StabilityReset {
                        selector: selector.to_string(),
                        stable_count: before,
                        reason,
                    });
                }
            }

            tokio::time::sleep(self.config.check_interval).await;
        }

        self.diagnostics.record(DiagnosticEvent::Stable {
            selector: selector.to_string(),
            samples,
        });
        Ok(())
    }
}
