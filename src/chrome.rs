//! Chrome engine
//!
//! Implements [`Engine`] over a CDP [`Session`]. Element queries run as page
//! JavaScript through `Runtime.evaluate`; handles are remote object ids, so a
//! handle keeps pointing at the same node even if the selector would now
//! match a different one.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::cdp::types::MouseEventType;
use crate::cdp::Session;
use crate::engine::{BoundingRect, Engine, SelectBy};
use crate::error::{Error, Result};

/// How often element waits re-query the DOM
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How often load waits re-check the document
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Quiet period with no in-flight fetch/XHR before the network counts as idle
const NETWORK_IDLE: Duration = Duration::from_millis(500);

/// Visibility predicate shared by every element query
const VISIBLE_FN: &str = r#"const visible = (el) => {
    if (!el || !el.isConnected) return false;
    const style = getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    const r = el.getBoundingClientRect();
    return r.width > 0 && r.height > 0;
};"#;

/// Installs fetch/XHR counters on first use and reports load state
const LOAD_STATE_JS: &str = r#"(() => {
    if (window.__storefront_pending === undefined) {
        window.__storefront_pending = 0;
        const originalFetch = window.fetch;
        window.fetch = function(...args) {
            window.__storefront_pending++;
            return originalFetch.apply(this, args).finally(() => {
                window.__storefront_pending--;
            });
        };
        const originalSend = XMLHttpRequest.prototype.send;
        XMLHttpRequest.prototype.send = function(...args) {
            window.__storefront_pending++;
            this.addEventListener('loadend', () => { window.__storefront_pending--; });
            return originalSend.apply(this, args);
        };
    }
    return { ready: document.readyState === 'complete', pending: window.__storefront_pending };
})()"#;

const RECT_FN: &str = r#"function() {
    if (!this.isConnected) throw new Error('Node is detached from the document');
    const style = getComputedStyle(this);
    const r = this.getBoundingClientRect();
    if (style.display === 'none' || style.visibility === 'hidden' || r.width === 0 || r.height === 0) {
        return null;
    }
    return { x: r.x, y: r.y, width: r.width, height: r.height };
}"#;

const SCROLL_FN: &str =
    "function() { this.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' }); }";

const CLEAR_FN: &str = r#"function() {
    this.focus();
    if ('value' in this) {
        this.value = '';
        this.dispatchEvent(new Event('input', { bubbles: true }));
    } else if (this.isContentEditable) {
        this.textContent = '';
    }
}"#;

const TEXT_FN: &str = "function() { return this.textContent; }";
const ATTRIBUTE_FN: &str = "function(name) { return this.getAttribute(name); }";
const ENABLED_FN: &str = "function() { return this.disabled !== true; }";
const CHECKED_FN: &str = "function() { return this.checked === true; }";

/// Returns `false` when no option matches
const SELECT_FN: &str = r#"function(by, wanted) {
    const option = Array.from(this.options || []).find(o =>
        by === 'value' ? o.value === wanted : o.label.trim() === wanted || o.text.trim() === wanted);
    if (!option) return false;
    this.value = option.value;
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
}"#;

/// Expression yielding the first match of `selector` when it is visible, or `null`
fn first_visible_js(selector: &str) -> String {
    format!(
        "(() => {{ {} const el = document.querySelector({}); return visible(el) ? el : null; }})()",
        VISIBLE_FN,
        json!(selector)
    )
}

/// Expression yielding whether the first match of `selector` is visible
fn first_match_visible_js(selector: &str) -> String {
    format!(
        "(() => {{ {} return visible(document.querySelector({})); }})()",
        VISIBLE_FN,
        json!(selector)
    )
}

/// Expression yielding whether any match of `selector` is visible
fn any_visible_js(selector: &str) -> String {
    format!(
        "(() => {{ {} return Array.from(document.querySelectorAll({})).some(visible); }})()",
        VISIBLE_FN,
        json!(selector)
    )
}

/// Expression yielding how many nodes match `selector`, visible or not
fn count_js(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", json!(selector))
}

/// A node resolved by [`ChromeEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromeHandle {
    object_id: String,
    selector: String,
}

impl ChromeHandle {
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// [`Engine`] backed by a live Chrome page
pub struct ChromeEngine {
    session: Session,
}

impl ChromeEngine {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Get the underlying CDP session
    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn call(&self, handle: &ChromeHandle, function: &str, args: &[Value]) -> Result<Value> {
        self.session
            .call_function_on(&handle.object_id, function, args)
            .await
    }
}

#[async_trait]
impl Engine for ChromeEngine {
    type Handle = ChromeHandle;

    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        tracing::debug!("Navigating to {}", url);
        tokio::time::timeout(timeout, self.session.navigate(url))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "Navigation to {} did not start within {}ms",
                    url,
                    timeout.as_millis()
                ))
            })??;
        Ok(())
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let mut idle_since: Option<Instant> = None;
        let mut last_pending = 0;

        loop {
            // The context is torn down mid-navigation; treat that as not ready
            if let Ok(state) = self.session.evaluate(LOAD_STATE_JS).await {
                let ready = state.get("ready").and_then(Value::as_bool).unwrap_or(false);
                last_pending = state.get("pending").and_then(Value::as_i64).unwrap_or(0);

                if ready && last_pending <= 0 {
                    let since = *idle_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= NETWORK_IDLE {
                        return Ok(());
                    }
                } else {
                    idle_since = None;
                }
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Page did not reach network idle within {}ms (pending: {})",
                    timeout.as_millis(),
                    last_pending
                )));
            }

            tokio::time::sleep(LOAD_POLL_INTERVAL).await;
        }
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<ChromeHandle> {
        let start = Instant::now();
        let expression = first_visible_js(selector);

        loop {
            // A malformed selector throws here and is reported immediately
            if let Some(object_id) = self.session.evaluate_object(&expression).await? {
                return Ok(ChromeHandle {
                    object_id,
                    selector: selector.to_string(),
                });
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Element '{}' not visible within {}ms",
                    selector,
                    timeout.as_millis()
                )));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let expression = any_visible_js(selector);

        loop {
            let visible = self.session.evaluate(&expression).await?;
            if visible.as_bool() != Some(true) {
                return Ok(());
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Element '{}' still visible after {}ms",
                    selector,
                    timeout.as_millis()
                )));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn is_visible(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let expression = first_match_visible_js(selector);
        let check = self.session.evaluate(&expression);
        let value = tokio::time::timeout(timeout, check).await.map_err(|_| {
            Error::Timeout(format!("Visibility check for '{}' timed out", selector))
        })??;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let value = self.session.evaluate(&count_js(selector)).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn bounding_rect(&self, handle: &ChromeHandle) -> Result<Option<BoundingRect>> {
        let value = self.call(handle, RECT_FN, &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&self, handle: &ChromeHandle) -> Result<()> {
        self.call(handle, SCROLL_FN, &[]).await?;
        let rect = self
            .bounding_rect(handle)
            .await?
            .ok_or_else(|| Error::not_visible(&handle.selector))?;
        let (x, y) = rect.center();

        self.session
            .mouse_event(MouseEventType::MouseMoved, x, y)
            .await?;
        self.session
            .mouse_event(MouseEventType::MousePressed, x, y)
            .await?;
        self.session
            .mouse_event(MouseEventType::MouseReleased, x, y)
            .await
    }

    async fn fill(&self, handle: &ChromeHandle, text: &str) -> Result<()> {
        self.call(handle, CLEAR_FN, &[]).await?;
        if !text.is_empty() {
            self.session.insert_text(text).await?;
        }
        Ok(())
    }

    async fn text_content(&self, handle: &ChromeHandle) -> Result<Option<String>> {
        let value = self.call(handle, TEXT_FN, &[]).await?;
        Ok(value.as_str().map(String::from))
    }

    async fn attribute(&self, handle: &ChromeHandle, name: &str) -> Result<Option<String>> {
        let value = self.call(handle, ATTRIBUTE_FN, &[json!(name)]).await?;
        Ok(value.as_str().map(String::from))
    }

    async fn is_enabled(&self, handle: &ChromeHandle) -> Result<bool> {
        let value = self.call(handle, ENABLED_FN, &[]).await?;
        Ok(value.as_bool().unwrap_or(true))
    }

    async fn is_checked(&self, handle: &ChromeHandle) -> Result<bool> {
        let value = self.call(handle, CHECKED_FN, &[]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn select_option(&self, handle: &ChromeHandle, option: &SelectBy) -> Result<()> {
        let (by, wanted) = match option {
            SelectBy::Value(v) => ("value", v),
            SelectBy::Label(l) => ("label", l),
        };
        let found = self
            .call(handle, SELECT_FN, &[json!(by), json!(wanted)])
            .await?;
        if found.as_bool() != Some(true) {
            return Err(Error::Engine(format!(
                "No option with {} '{}' in '{}'",
                by, wanted, handle.selector
            )));
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.session.frame_url().await
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        self.session.capture_screenshot(full_page).await
    }

    async fn performance_metrics(&self) -> Result<HashMap<String, f64>> {
        Ok(self.session.performance_metrics().await?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_quoted_as_js_string() {
        let js = first_visible_js(r#"input[data-qa="login-email"]"#);
        assert!(js.contains(r#"document.querySelector("input[data-qa=\"login-email\"]")"#));
        assert!(js.contains("const visible"));
    }

    #[test]
    fn test_action_and_visibility_check_resolve_the_same_node() {
        // both look only at the first match; a later visible match is never picked
        let action = first_visible_js("#x");
        let check = first_match_visible_js("#x");
        assert!(action.contains(r##"document.querySelector("#x")"##));
        assert!(!action.contains("querySelectorAll"));
        assert!(check.contains(r##"document.querySelector("#x")"##));
    }

    #[test]
    fn test_count_includes_hidden_matches() {
        assert_eq!(
            count_js("a[href='/login']"),
            r#"document.querySelectorAll("a[href='/login']").length"#
        );
    }

    #[test]
    fn test_visibility_check_looks_at_first_match_only() {
        let js = first_match_visible_js("#a");
        assert!(js.contains(r##"visible(document.querySelector("#a"))"##));
        assert!(!js.contains("querySelectorAll"));
    }

    #[test]
    fn test_hidden_wait_checks_every_match() {
        let js = any_visible_js(".spinner");
        assert!(js.contains(r#"Array.from(document.querySelectorAll(".spinner")).some(visible)"#));
    }

    #[test]
    fn test_rect_payload_deserializes() {
        let rect: Option<BoundingRect> =
            serde_json::from_value(json!({"x": 1.0, "y": 2.0, "width": 30.0, "height": 4.0}))
                .unwrap();
        assert_eq!(rect, Some(BoundingRect::new(1.0, 2.0, 30.0, 4.0)));

        let absent: Option<BoundingRect> = serde_json::from_value(Value::Null).unwrap();
        assert_eq!(absent, None);
    }
}
