//! Page Abstraction
//!
//! [`BasePage`] is the resilient action wrapper every page object is built on.
//! Actions (`click`, `type_text`, `navigate`, ...) return `Result` and never
//! swallow a failure: they record it, save one screenshot, and hand back the
//! original error. State checks (`is_visible`, `is_enabled`, ...) return a plain
//! `bool` and treat every resolution error as `false`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::capture::{error_tag, timestamped_tag, FailureArtifact, FailureCapture};
use crate::config::join_url;
use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::engine::{Engine, SelectBy};
use crate::error::{Error, Result};
use crate::locator::{Locator, StabilityGate};
use crate::ActionConfig;

/// A browser page with retrying, stability-gated actions
pub struct BasePage<E: Engine> {
    engine: E,
    config: Arc<ActionConfig>,
    capture: FailureCapture,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<E: Engine> BasePage<E> {
    /// Wrap an engine, logging diagnostics through `tracing`
    pub fn new(engine: E, config: ActionConfig) -> Self {
        Self::with_diagnostics(engine, config, Arc::new(TracingDiagnostics))
    }

    /// Wrap an engine with an explicit diagnostics sink
    pub fn with_diagnostics(
        engine: E,
        config: ActionConfig,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        let capture = FailureCapture::new(config.screenshot_dir.clone());
        Self {
            engine,
            config: Arc::new(config),
            capture,
            diagnostics,
        }
    }

    /// Get the underlying engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &ActionConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }

    fn timeout(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.config.timeout)
    }

    fn locator(&self) -> Locator<'_, E> {
        Locator::new(
            &self.engine,
            self.config.retry,
            &self.capture,
            self.diagnostics.as_ref(),
        )
    }

    fn gate(&self) -> StabilityGate<'_, E> {
        StabilityGate::new(&self.engine, self.config.stability, self.diagnostics.as_ref())
    }

    fn performed(&self, operation: &str, selector: &str) {
        self.diagnostics.record(DiagnosticEvent::ActionPerformed {
            operation: operation.to_string(),
            selector: selector.to_string(),
        });
    }

    /// Poll the enabled state of `handle` until it is true or `deadline` passes
    async fn until_enabled(
        &self,
        handle: &E::Handle,
        selector: &str,
        deadline: Instant,
    ) -> Result<()> {
        loop {
            if self.engine.is_enabled(handle).await? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout(format!("'{}' stayed disabled", selector)));
            }
            tokio::time::sleep(self.config.stability.check_interval.min(deadline - now)).await;
        }
    }

    /// Record a failed action, save its screenshot, and return the error untouched
    ///
    /// A `LocateTimeout` already saved its own screenshot, so it is not
    /// captured a second time.
    async fn fail<T>(&self, operation: &str, target: &str, tag: String, err: Error) -> Result<T> {
        self.diagnostics.record(DiagnosticEvent::ActionFailed {
            operation: operation.to_string(),
            selector: target.to_string(),
            error: err.to_string(),
        });
        if !matches!(err, Error::LocateTimeout { .. }) {
            self.capture
                .capture(&self.engine, self.diagnostics.as_ref(), &tag, Some(target))
                .await;
        }
        Err(err)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate to a URL and wait until the network is idle
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let start = Instant::now();
        let timeout = self.config.timeout;

        let result = async {
            self.engine.goto(url, timeout).await?;
            self.engine.wait_for_load(timeout).await
        }
        .await;

        match result {
            Ok(()) => {
                self.diagnostics.record(DiagnosticEvent::Navigated {
                    url: url.to_string(),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
                Ok(())
            }
            Err(e) => self.fail("navigate", url, error_tag("navigate"), e).await,
        }
    }

    /// Navigate to `path` under `base_url`
    pub async fn goto_path(&self, base_url: &str, path: &str) -> Result<()> {
        self.navigate(&join_url(base_url, path)).await
    }

    /// Wait for the current navigation to settle
    pub async fn wait_for_navigation(&self, timeout: Option<Duration>) -> Result<()> {
        match self.engine.wait_for_load(self.timeout(timeout)).await {
            Ok(()) => {
                tracing::info!("Navigation complete");
                Ok(())
            }
            Err(e) => {
                self.fail(
                    "wait_for_navigation",
                    "document",
                    timestamped_tag("navigation_timeout"),
                    e,
                )
                .await
            }
        }
    }

    /// Get current URL
    pub async fn current_url(&self) -> Result<String> {
        self.engine.current_url().await
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Click the first visible match of `selector` once it has stopped moving
    pub async fn click(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        let timeout = self.timeout(timeout);
        let result = async {
            let handle = self.locator().locate(selector, timeout).await?;
            self.gate().await_stable(&handle, selector, timeout).await?;
            self.engine.click(&handle).await
        }
        .await;

        match result {
            Ok(()) => {
                self.performed("click", selector);
                Ok(())
            }
            Err(e) => self.fail("click", selector, error_tag("click"), e).await,
        }
    }

    /// Replace the value of the first visible match of `selector`
    pub async fn type_text(
        &self,
        selector: &str,
        text: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let timeout = self.timeout(timeout);
        let result = async {
            let handle = self.locator().locate(selector, timeout).await?;
            self.engine.fill(&handle, text).await
        }
        .await;

        match result {
            Ok(()) => {
                self.performed("type_text", selector);
                Ok(())
            }
            Err(e) => {
                self.fail("type_text", selector, error_tag("type_text"), e)
                    .await
            }
        }
    }

    /// Tick a checkbox or radio button; already-checked elements are left alone
    pub async fn check(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        let timeout = self.timeout(timeout);
        let deadline = Instant::now() + timeout;
        let result: Result<()> = async {
            let handle = self.locator().locate(selector, timeout).await?;
            self.until_enabled(&handle, selector, deadline).await?;
            if self.engine.is_checked(&handle).await? {
                return Ok(());
            }
            self.gate().await_stable(&handle, selector, timeout).await?;
            self.engine.click(&handle).await?;
            if !self.engine.is_checked(&handle).await? {
                return Err(Error::Engine(format!(
                    "'{}' did not become checked after click",
                    selector
                )));
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.performed("check", selector);
                Ok(())
            }
            Err(e) => self.fail("check", selector, error_tag("check"), e).await,
        }
    }

    /// Choose an option of the `<select>` matched by `selector`
    pub async fn select_option(
        &self,
        selector: &str,
        option: SelectBy,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let timeout = self.timeout(timeout);
        let deadline = Instant::now() + timeout;
        let result = async {
            let handle = self.locator().locate(selector, timeout).await?;
            self.until_enabled(&handle, selector, deadline).await?;
            self.engine.select_option(&handle, &option).await
        }
        .await;

        match result {
            Ok(()) => {
                self.performed("select_option", selector);
                Ok(())
            }
            Err(e) => {
                self.fail("select_option", selector, error_tag("select_option"), e)
                    .await
            }
        }
    }

    /// Text content of the first visible match; empty when the node has none
    pub async fn get_text(&self, selector: &str, timeout: Option<Duration>) -> Result<String> {
        let timeout = self.timeout(timeout);
        let result = async {
            let handle = self.locator().locate(selector, timeout).await?;
            self.engine.text_content(&handle).await
        }
        .await;

        match result {
            Ok(text) => Ok(text.unwrap_or_default()),
            Err(e) => self.fail("get_text", selector, error_tag("get_text"), e).await,
        }
    }

    /// Attribute value of the first visible match
    pub async fn get_attribute(
        &self,
        selector: &str,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>> {
        let timeout = self.timeout(timeout);
        let result = async {
            let handle = self.locator().locate(selector, timeout).await?;
            self.engine.attribute(&handle, name).await
        }
        .await;

        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                self.fail("get_attribute", selector, error_tag("get_attribute"), e)
                    .await
            }
        }
    }

    // =========================================================================
    // Wait Helpers
    // =========================================================================

    /// Wait until `selector` is visible, retrying within the budget
    pub async fn wait_for_visible(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        match self.locator().locate(selector, self.timeout(timeout)).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.fail("wait_for_visible", selector, error_tag("wait_for_visible"), e)
                    .await
            }
        }
    }

    /// Wait until `selector` is visible and enabled
    pub async fn wait_for_clickable(
        &self,
        selector: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let timeout = self.timeout(timeout);
        let deadline = Instant::now() + timeout;
        let result = async {
            let handle = self.locator().locate(selector, timeout).await?;
            self.until_enabled(&handle, selector, deadline).await
        }
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail(
                    "wait_for_clickable",
                    selector,
                    error_tag("wait_for_clickable"),
                    e,
                )
                .await
            }
        }
    }

    /// Wait until no visible element matches `selector`
    pub async fn wait_for_hidden(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        match self
            .engine
            .wait_for_hidden(selector, self.timeout(timeout))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail("wait_for_hidden", selector, error_tag("wait_for_hidden"), e)
                    .await
            }
        }
    }

    // =========================================================================
    // State Checks
    // =========================================================================

    /// Whether the first match of `selector` is visible right now
    ///
    /// Resolves once, without retries. A selector that matches nothing, or
    /// any engine error, is reported as `false`.
    #[must_use = "returns visibility state"]
    pub async fn is_visible(&self, selector: &str, timeout: Option<Duration>) -> bool {
        self.engine
            .is_visible(selector, self.timeout(timeout))
            .await
            .unwrap_or(false)
    }

    /// Whether anything in the document matches `selector`, hidden or not
    #[must_use = "returns presence"]
    pub async fn is_present(&self, selector: &str) -> bool {
        matches!(self.engine.count(selector).await, Ok(n) if n > 0)
    }

    /// Whether the first visible match of `selector` is enabled; `false` when unresolved
    #[must_use = "returns enabled state"]
    pub async fn is_enabled(&self, selector: &str, timeout: Option<Duration>) -> bool {
        match self
            .engine
            .wait_for_visible(selector, self.timeout(timeout))
            .await
        {
            Ok(handle) => self.engine.is_enabled(&handle).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Whether the first visible match of `selector` is disabled; `false` when unresolved
    #[must_use = "returns disabled state"]
    pub async fn is_disabled(&self, selector: &str, timeout: Option<Duration>) -> bool {
        match self
            .engine
            .wait_for_visible(selector, self.timeout(timeout))
            .await
        {
            Ok(handle) => matches!(self.engine.is_enabled(&handle).await, Ok(false)),
            Err(_) => false,
        }
    }

    /// Whether the first visible match of `selector` is checked; `false` when unresolved
    #[must_use = "returns checked state"]
    pub async fn is_checked(&self, selector: &str, timeout: Option<Duration>) -> bool {
        match self
            .engine
            .wait_for_visible(selector, self.timeout(timeout))
            .await
        {
            Ok(handle) => self.engine.is_checked(&handle).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    // =========================================================================
    // Debug Helpers
    // =========================================================================

    /// Browser performance counters; empty when they cannot be read
    pub async fn get_performance_metrics(&self) -> HashMap<String, f64> {
        match self.engine.performance_metrics().await {
            Ok(metrics) => {
                if let Some(loaded) = metrics.get("DomContentLoaded") {
                    tracing::info!("DOMContentLoaded at {:.3}s", loaded);
                }
                metrics
            }
            Err(e) => {
                tracing::error!("Failed to read performance metrics: {}", e);
                HashMap::new()
            }
        }
    }

    /// Save a full-page screenshot named after `name`
    pub async fn screenshot(&self, name: &str) -> Option<FailureArtifact> {
        self.capture
            .capture(
                &self.engine,
                self.diagnostics.as_ref(),
                &timestamped_tag(name),
                None,
            )
            .await
    }
}
