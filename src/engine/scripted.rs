//! In-memory engine driven by per-element scripts
//!
//! Each element follows a list of [`Tick`]s. Every observation that a real
//! browser would answer from a fresh layout (a visibility wait or a
//! bounding-rect sample) consumes one tick; the last tick repeats forever.
//! `is_visible` and `count` peek at the current tick without consuming it.
//!
//! ```rust
//! use storefront_e2e::engine::{BoundingRect, ScriptedEngine, Tick};
//!
//! let rect = BoundingRect::new(10.0, 10.0, 80.0, 24.0);
//! let engine = ScriptedEngine::new()
//!     .element("#submit", [Tick::Hidden, Tick::Hidden, Tick::Visible(rect)])
//!     .text("#submit", "Submit");
//! assert_eq!(engine.visibility_checks("#submit"), 0);
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{BoundingRect, Engine, SelectBy};
use crate::error::{Error, Result};

/// Smallest valid-looking PNG payload: signature plus an empty IEND chunk
const PNG_STUB: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE,
    0x42, 0x60, 0x82,
];

/// One observed state of a scripted element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// In the DOM but not rendered
    Hidden,
    /// Not attached to the document; geometry reads fail
    Detached,
    /// Rendered at the given rect
    Visible(BoundingRect),
}

#[derive(Debug, Default)]
struct ElementScript {
    ticks: Vec<Tick>,
    cursor: usize,
    visibility_checks: usize,
    rect_samples: usize,
    text: Option<String>,
    attributes: HashMap<String, String>,
    disabled: bool,
    /// Enabled-state reads that still report disabled
    disabled_reads: usize,
    /// `Some` for checkboxes and radios; clicks toggle it
    checked: Option<bool>,
    /// `(value, label)` pairs of a `<select>`
    options: Vec<(String, String)>,
    click_error: Option<String>,
    fill_error: Option<String>,
}

impl ElementScript {
    fn current(&self) -> Tick {
        match self.ticks.len() {
            0 => Tick::Detached,
            len => self.ticks[self.cursor.min(len - 1)],
        }
    }

    fn advance(&mut self) -> Tick {
        let tick = self.current();
        self.cursor += 1;
        tick
    }
}

#[derive(Debug, Default)]
struct State {
    elements: HashMap<String, ElementScript>,
    url: String,
    navigations: Vec<String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    selections: Vec<(String, String)>,
    screenshots: usize,
    metrics: HashMap<String, f64>,
    navigation_error: Option<String>,
    screenshot_error: Option<String>,
}

/// Handle to a scripted element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedHandle {
    selector: String,
}

impl ScriptedHandle {
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// Deterministic [`Engine`] for exercising page objects without a browser
#[derive(Debug)]
pub struct ScriptedEngine {
    state: Mutex<State>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens inside a failing test
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_element(self, selector: &str, f: impl FnOnce(&mut ElementScript)) -> Self {
        {
            let mut state = self.state();
            f(state.elements.entry(selector.to_string()).or_default());
        }
        self
    }

    /// Script the ticks an element goes through
    pub fn element(self, selector: &str, ticks: impl IntoIterator<Item = Tick>) -> Self {
        let ticks: Vec<Tick> = ticks.into_iter().collect();
        self.with_element(selector, |el| {
            el.ticks = ticks;
            el.cursor = 0;
        })
    }

    /// Shorthand for an element that is visible and stationary from the start
    pub fn visible(self, selector: &str, rect: BoundingRect) -> Self {
        self.element(selector, [Tick::Visible(rect)])
    }

    pub fn text(self, selector: &str, text: &str) -> Self {
        let text = text.to_string();
        self.with_element(selector, |el| el.text = Some(text))
    }

    pub fn attribute(self, selector: &str, name: &str, value: &str) -> Self {
        let (name, value) = (name.to_string(), value.to_string());
        self.with_element(selector, |el| {
            el.attributes.insert(name, value);
        })
    }

    pub fn disabled(self, selector: &str) -> Self {
        self.with_element(selector, |el| el.disabled = true)
    }

    /// Report `selector` as disabled for its first `reads` enabled-state reads
    pub fn enabled_after(self, selector: &str, reads: usize) -> Self {
        self.with_element(selector, |el| el.disabled_reads = reads)
    }

    /// Performance counters returned by [`Engine::performance_metrics`]
    pub fn metrics(self, metrics: &[(&str, f64)]) -> Self {
        self.state().metrics = metrics
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        self
    }

    /// Make `selector` a checkbox whose state clicks toggle
    pub fn checkbox(self, selector: &str, checked: bool) -> Self {
        self.with_element(selector, |el| el.checked = Some(checked))
    }

    /// Give a `<select>` its `(value, label)` options
    pub fn options(self, selector: &str, options: &[(&str, &str)]) -> Self {
        let options: Vec<(String, String)> = options
            .iter()
            .map(|(v, l)| (v.to_string(), l.to_string()))
            .collect();
        self.with_element(selector, |el| el.options = options)
    }

    /// Make clicks on `selector` fail with `message`
    pub fn fail_click(self, selector: &str, message: &str) -> Self {
        let message = message.to_string();
        self.with_element(selector, |el| el.click_error = Some(message))
    }

    /// Make fills on `selector` fail with `message`
    pub fn fail_fill(self, selector: &str, message: &str) -> Self {
        let message = message.to_string();
        self.with_element(selector, |el| el.fill_error = Some(message))
    }

    /// Make every navigation fail with `message`
    pub fn fail_navigation(self, message: &str) -> Self {
        self.state().navigation_error = Some(message.to_string());
        self
    }

    /// Make every screenshot fail with `message`
    pub fn fail_screenshot(self, message: &str) -> Self {
        self.state().screenshot_error = Some(message.to_string());
        self
    }

    /// Number of visibility waits issued against `selector`
    pub fn visibility_checks(&self, selector: &str) -> usize {
        self.state()
            .elements
            .get(selector)
            .map_or(0, |el| el.visibility_checks)
    }

    /// Number of bounding-rect samples taken from `selector`
    pub fn rect_samples(&self, selector: &str) -> usize {
        self.state()
            .elements
            .get(selector)
            .map_or(0, |el| el.rect_samples)
    }

    /// Selectors clicked, in order
    pub fn clicks(&self) -> Vec<String> {
        self.state().clicks.clone()
    }

    /// `(selector, text)` pairs filled, in order
    pub fn fills(&self) -> Vec<(String, String)> {
        self.state().fills.clone()
    }

    /// `(selector, option value)` pairs chosen, in order
    pub fn selections(&self) -> Vec<(String, String)> {
        self.state().selections.clone()
    }

    /// URLs navigated to, in order
    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn screenshots_taken(&self) -> usize {
        self.state().screenshots
    }

    fn element_mut<'s>(state: &'s mut State, selector: &str) -> Result<&'s mut ElementScript> {
        state
            .elements
            .get_mut(selector)
            .ok_or_else(|| Error::ElementNotFound(selector.to_string()))
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    type Handle = ScriptedHandle;

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.state();
        if let Some(message) = &state.navigation_error {
            return Err(Error::Navigation(message.clone()));
        }
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<ScriptedHandle> {
        let mut state = self.state();
        let not_visible = || {
            Error::Timeout(format!(
                "Element '{}' not visible within {}ms",
                selector,
                timeout.as_millis()
            ))
        };
        let el = state.elements.get_mut(selector).ok_or_else(not_visible)?;
        el.visibility_checks += 1;
        match el.advance() {
            Tick::Visible(_) => Ok(ScriptedHandle {
                selector: selector.to_string(),
            }),
            Tick::Hidden | Tick::Detached => Err(not_visible()),
        }
    }

    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> Result<()> {
        let mut state = self.state();
        let Some(el) = state.elements.get_mut(selector) else {
            return Ok(());
        };
        match el.advance() {
            Tick::Visible(_) => Err(Error::Timeout(format!(
                "Element '{}' still visible after {}ms",
                selector,
                timeout.as_millis()
            ))),
            Tick::Hidden | Tick::Detached => Ok(()),
        }
    }

    async fn is_visible(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        let mut state = self.state();
        let el = Self::element_mut(&mut state, selector)?;
        Ok(matches!(el.current(), Tick::Visible(_)))
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let state = self.state();
        Ok(match state.elements.get(selector).map(ElementScript::current) {
            Some(Tick::Visible(_)) | Some(Tick::Hidden) => 1,
            Some(Tick::Detached) | None => 0,
        })
    }

    async fn bounding_rect(&self, handle: &ScriptedHandle) -> Result<Option<BoundingRect>> {
        let mut state = self.state();
        let el = Self::element_mut(&mut state, &handle.selector)?;
        el.rect_samples += 1;
        match el.advance() {
            Tick::Visible(rect) => Ok(Some(rect)),
            Tick::Hidden => Ok(None),
            Tick::Detached => Err(Error::Engine(format!(
                "Node for '{}' is detached from the document",
                handle.selector
            ))),
        }
    }

    async fn click(&self, handle: &ScriptedHandle) -> Result<()> {
        let mut state = self.state();
        let el = Self::element_mut(&mut state, &handle.selector)?;
        if let Some(message) = &el.click_error {
            return Err(Error::Engine(message.clone()));
        }
        if let Some(checked) = el.checked.as_mut() {
            *checked = !*checked;
        }
        state.clicks.push(handle.selector.clone());
        Ok(())
    }

    async fn fill(&self, handle: &ScriptedHandle, text: &str) -> Result<()> {
        let mut state = self.state();
        let el = Self::element_mut(&mut state, &handle.selector)?;
        if let Some(message) = &el.fill_error {
            return Err(Error::Engine(message.clone()));
        }
        state
            .fills
            .push((handle.selector.clone(), text.to_string()));
        Ok(())
    }

    async fn text_content(&self, handle: &ScriptedHandle) -> Result<Option<String>> {
        let mut state = self.state();
        Ok(Self::element_mut(&mut state, &handle.selector)?.text.clone())
    }

    async fn attribute(&self, handle: &ScriptedHandle, name: &str) -> Result<Option<String>> {
        let mut state = self.state();
        let el = Self::element_mut(&mut state, &handle.selector)?;
        Ok(el.attributes.get(name).cloned())
    }

    async fn is_enabled(&self, handle: &ScriptedHandle) -> Result<bool> {
        let mut state = self.state();
        let el = Self::element_mut(&mut state, &handle.selector)?;
        if el.disabled {
            return Ok(false);
        }
        if el.disabled_reads > 0 {
            el.disabled_reads -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn is_checked(&self, handle: &ScriptedHandle) -> Result<bool> {
        let mut state = self.state();
        Ok(Self::element_mut(&mut state, &handle.selector)?
            .checked
            .unwrap_or(false))
    }

    async fn select_option(&self, handle: &ScriptedHandle, option: &SelectBy) -> Result<()> {
        let mut state = self.state();
        let el = Self::element_mut(&mut state, &handle.selector)?;
        let value = el
            .options
            .iter()
            .find(|(value, label)| match option {
                SelectBy::Value(v) => v == value,
                SelectBy::Label(l) => l == label,
            })
            .map(|(value, _)| value.clone())
            .ok_or_else(|| {
                Error::Engine(format!(
                    "No option matching {:?} in '{}'",
                    option, handle.selector
                ))
            })?;
        state.selections.push((handle.selector.clone(), value));
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().url.clone())
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>> {
        let mut state = self.state();
        if let Some(message) = &state.screenshot_error {
            return Err(Error::Engine(message.clone()));
        }
        state.screenshots += 1;
        Ok(PNG_STUB.to_vec())
    }

    async fn performance_metrics(&self) -> Result<HashMap<String, f64>> {
        Ok(self.state().metrics.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECT: BoundingRect = BoundingRect {
        x: 0.0,
        y: 0.0,
        width: 10.0,
        height: 10.0,
    };

    #[tokio::test]
    async fn test_ticks_advance_per_observation() {
        let engine = ScriptedEngine::new().element("#a", [Tick::Hidden, Tick::Visible(RECT)]);
        let timeout = Duration::from_millis(10);

        assert!(engine.wait_for_visible("#a", timeout).await.is_err());
        let handle = engine.wait_for_visible("#a", timeout).await.unwrap();
        // last tick repeats
        assert_eq!(engine.bounding_rect(&handle).await.unwrap(), Some(RECT));
        assert_eq!(engine.bounding_rect(&handle).await.unwrap(), Some(RECT));
        assert_eq!(engine.visibility_checks("#a"), 2);
        assert_eq!(engine.rect_samples("#a"), 2);
    }

    #[tokio::test]
    async fn test_is_visible_does_not_consume_ticks() {
        let engine = ScriptedEngine::new().element("#a", [Tick::Hidden, Tick::Visible(RECT)]);
        let timeout = Duration::from_millis(10);

        assert!(!engine.is_visible("#a", timeout).await.unwrap());
        assert!(!engine.is_visible("#a", timeout).await.unwrap());
        assert!(engine.is_visible("#missing", timeout).await.is_err());
    }

    #[tokio::test]
    async fn test_detached_tick_fails_geometry_read() {
        let engine = ScriptedEngine::new().element("#a", [Tick::Visible(RECT), Tick::Detached]);
        let handle = engine
            .wait_for_visible("#a", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(engine.bounding_rect(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_click_failure_and_recording() {
        let engine = ScriptedEngine::new()
            .visible("#ok", RECT)
            .visible("#bad", RECT)
            .fail_click("#bad", "element is not attached");
        let timeout = Duration::from_millis(10);

        let ok = engine.wait_for_visible("#ok", timeout).await.unwrap();
        let bad = engine.wait_for_visible("#bad", timeout).await.unwrap();
        engine.click(&ok).await.unwrap();
        let err = engine.click(&bad).await.unwrap_err();

        assert!(err.to_string().contains("element is not attached"));
        assert_eq!(engine.clicks(), vec!["#ok".to_string()]);
    }

    #[tokio::test]
    async fn test_checkbox_and_select() {
        let engine = ScriptedEngine::new()
            .visible("#newsletter", RECT)
            .checkbox("#newsletter", false)
            .visible("#country", RECT)
            .options("#country", &[("IN", "India"), ("US", "United States")]);
        let timeout = Duration::from_millis(10);

        let box_ = engine.wait_for_visible("#newsletter", timeout).await.unwrap();
        assert!(!engine.is_checked(&box_).await.unwrap());
        engine.click(&box_).await.unwrap();
        assert!(engine.is_checked(&box_).await.unwrap());

        let select = engine.wait_for_visible("#country", timeout).await.unwrap();
        engine
            .select_option(&select, &SelectBy::label("United States"))
            .await
            .unwrap();
        assert!(engine
            .select_option(&select, &SelectBy::value("FR"))
            .await
            .is_err());
        assert_eq!(
            engine.selections(),
            vec![("#country".to_string(), "US".to_string())]
        );
    }

    #[tokio::test]
    async fn test_count_sees_hidden_but_not_detached() {
        let engine = ScriptedEngine::new()
            .element("#hidden", [Tick::Hidden])
            .element("#gone", [Tick::Detached]);

        assert_eq!(engine.count("#hidden").await.unwrap(), 1);
        assert_eq!(engine.count("#gone").await.unwrap(), 0);
        assert_eq!(engine.count("#missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enabled_after_reads() {
        let engine = ScriptedEngine::new()
            .visible("#submit", RECT)
            .enabled_after("#submit", 2);
        let handle = engine
            .wait_for_visible("#submit", Duration::from_millis(10))
            .await
            .unwrap();

        assert!(!engine.is_enabled(&handle).await.unwrap());
        assert!(!engine.is_enabled(&handle).await.unwrap());
        assert!(engine.is_enabled(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_screenshot_is_png() {
        let engine = ScriptedEngine::new();
        let png = engine.screenshot(true).await.unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!(engine.screenshots_taken(), 1);
    }
}
