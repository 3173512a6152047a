//! CDP Connection/Session Management
//!
//! [`Connection`] talks to the browser endpoint; [`Session`] is attached to
//! one page target and carries every page-level command.

use std::sync::Arc;

use base64::Engine as _;
use serde_json::Value;

use super::transport::Transport;
use super::types::*;
use crate::error::{Error, Result};

/// Browser-level CDP connection
pub struct Connection {
    transport: Arc<Transport>,
}

impl Connection {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Get browser version info
    pub async fn version(&self) -> Result<BrowserGetVersionResult> {
        self.transport
            .send(None, "Browser.getVersion", &BrowserGetVersion {})
            .await
    }

    /// Open a new tab and return its target id
    pub async fn create_target(&self, url: &str, width: u32, height: u32) -> Result<String> {
        let result: TargetCreateTargetResult = self
            .transport
            .send(
                None,
                "Target.createTarget",
                &TargetCreateTarget {
                    url: url.to_string(),
                    width: Some(width),
                    height: Some(height),
                },
            )
            .await?;
        Ok(result.target_id)
    }

    /// Attach to a target with a flattened session
    pub async fn attach_to_target(&self, target_id: &str) -> Result<Session> {
        let result: TargetAttachToTargetResult = self
            .transport
            .send(
                None,
                "Target.attachToTarget",
                &TargetAttachToTarget {
                    target_id: target_id.to_string(),
                    flatten: true,
                },
            )
            .await?;

        Ok(Session {
            transport: Arc::clone(&self.transport),
            session_id: result.session_id,
            target_id: target_id.to_string(),
        })
    }

    pub async fn close_target(&self, target_id: &str) -> Result<bool> {
        let result: TargetCloseTargetResult = self
            .transport
            .send(
                None,
                "Target.closeTarget",
                &TargetCloseTarget {
                    target_id: target_id.to_string(),
                },
            )
            .await?;
        Ok(result.success)
    }

    /// Ask the browser to exit, then close the socket
    pub async fn close(&self) {
        // The browser may drop the socket before it answers
        let _ = self
            .transport
            .send::<_, Value>(None, "Browser.close", &BrowserClose {})
            .await;
        self.transport.close().await;
    }
}

/// A CDP session attached to one page target
pub struct Session {
    transport: Arc<Transport>,
    session_id: String,
    target_id: String,
}

impl Session {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Send a command to this session
    pub async fn send<C, R>(&self, method: &str, params: &C) -> Result<R>
    where
        C: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        self.transport
            .send(Some(&self.session_id), method, params)
            .await
    }

    // =========================================================================
    // Page
    // =========================================================================

    pub async fn page_enable(&self) -> Result<()> {
        self.send::<_, Value>("Page.enable", &PageEnable {}).await?;
        Ok(())
    }

    /// Start a navigation; fails with [`Error::Navigation`] when Chrome reports one
    pub async fn navigate(&self, url: &str) -> Result<PageNavigateResult> {
        let result: PageNavigateResult = self
            .send(
                "Page.navigate",
                &PageNavigate {
                    url: url.to_string(),
                },
            )
            .await?;
        match result.error_text.as_deref() {
            Some(text) if !text.is_empty() => {
                Err(Error::Navigation(format!("{}: {}", url, text)))
            }
            _ => Ok(result),
        }
    }

    /// Capture a PNG, optionally including content beyond the viewport
    pub async fn capture_screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        let result: PageCaptureScreenshotResult = self
            .send(
                "Page.captureScreenshot",
                &PageCaptureScreenshot {
                    format: Some("png".to_string()),
                    capture_beyond_viewport: full_page.then_some(true),
                },
            )
            .await?;

        base64::engine::general_purpose::STANDARD
            .decode(&result.data)
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// URL of the main frame
    pub async fn frame_url(&self) -> Result<String> {
        let result: PageGetFrameTreeResult =
            self.send("Page.getFrameTree", &PageGetFrameTree {}).await?;
        Ok(result.frame_tree.frame.url)
    }

    // =========================================================================
    // Performance
    // =========================================================================

    /// Enable the Performance domain and read its current metrics
    pub async fn performance_metrics(&self) -> Result<Vec<(String, f64)>> {
        self.send::<_, Value>("Performance.enable", &PerformanceEnable {})
            .await?;
        let result: PerformanceGetMetricsResult = self
            .send("Performance.getMetrics", &PerformanceGetMetrics {})
            .await?;
        Ok(result
            .metrics
            .into_iter()
            .map(|m| (m.name, m.value))
            .collect())
    }

    // =========================================================================
    // Input
    // =========================================================================

    pub async fn mouse_event(&self, kind: MouseEventType, x: f64, y: f64) -> Result<()> {
        let (button, click_count) = match kind {
            MouseEventType::MouseMoved => (None, None),
            _ => (Some(MouseButton::Left), Some(1)),
        };
        self.send::<_, Value>(
            "Input.dispatchMouseEvent",
            &InputDispatchMouseEvent {
                r#type: kind,
                x,
                y,
                button,
                click_count,
            },
        )
        .await?;
        Ok(())
    }

    /// Insert text into the focused element as a single input event
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.send::<_, Value>(
            "Input.insertText",
            &InputInsertText {
                text: text.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    // =========================================================================
    // Runtime
    // =========================================================================

    /// Evaluate an expression and return its JSON value
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result: RuntimeEvaluateResult = self
            .send(
                "Runtime.evaluate",
                &RuntimeEvaluate {
                    expression: expression.to_string(),
                    return_by_value: Some(true),
                    await_promise: Some(true),
                },
            )
            .await?;
        if let Some(details) = result.exception_details {
            return Err(Error::Engine(details.message()));
        }
        Ok(result.result.value.unwrap_or(Value::Null))
    }

    /// Evaluate an expression and return a remote reference to the result
    ///
    /// `None` when the expression yields `null` or `undefined`.
    pub async fn evaluate_object(&self, expression: &str) -> Result<Option<String>> {
        let result: RuntimeEvaluateResult = self
            .send(
                "Runtime.evaluate",
                &RuntimeEvaluate {
                    expression: expression.to_string(),
                    return_by_value: Some(false),
                    await_promise: None,
                },
            )
            .await?;
        if let Some(details) = result.exception_details {
            return Err(Error::Engine(details.message()));
        }
        if result.result.is_nullish() {
            return Ok(None);
        }
        Ok(result.result.object_id)
    }

    /// Call `function_declaration` with `this` bound to a remote object
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function_declaration: &str,
        args: &[Value],
    ) -> Result<Value> {
        let result: RuntimeCallFunctionOnResult = self
            .send(
                "Runtime.callFunctionOn",
                &RuntimeCallFunctionOn {
                    function_declaration: function_declaration.to_string(),
                    object_id: object_id.to_string(),
                    arguments: args
                        .iter()
                        .map(|v| CallArgument { value: v.clone() })
                        .collect(),
                    return_by_value: Some(true),
                },
            )
            .await?;
        if let Some(details) = result.exception_details {
            return Err(Error::Engine(details.message()));
        }
        Ok(result.result.value.unwrap_or(Value::Null))
    }
}
