//! Automation Engine
//!
//! The capability surface the interaction layer needs from a browser driver.
//! Everything above this trait treats selectors as opaque strings and element
//! handles as short-lived tokens.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod scripted;

pub use scripted::{ScriptedEngine, Tick};

/// Snapshot of an element's layout box at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when every field differs from `other` by less than one unit
    pub fn approx_eq(&self, other: &BoundingRect) -> bool {
        (self.x - other.x).abs() < 1.0
            && (self.y - other.y).abs() < 1.0
            && (self.width - other.width).abs() < 1.0
            && (self.height - other.height).abs() < 1.0
    }

    /// Get the center point
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// How to pick an `<option>` inside a `<select>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectBy {
    /// Match the option's `value` attribute
    Value(String),
    /// Match the option's visible text
    Label(String),
}

impl SelectBy {
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }
}

/// Browser-driving primitives
///
/// Implementations resolve a selector to its *first* match. Handles are never
/// cached by callers across operations; an implementation may invalidate them
/// whenever the document changes.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Live reference to a DOM node
    type Handle: Send + Sync;

    /// Navigate the page to `url`
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Block until the document is loaded and the network has gone quiet
    async fn wait_for_load(&self, timeout: Duration) -> Result<()>;

    /// Wait up to `timeout` for the first match of `selector` to be visible
    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<Self::Handle>;

    /// Wait up to `timeout` until no visible element matches `selector`
    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Resolve `selector` once and report whether its first match is visible
    async fn is_visible(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Number of nodes matching `selector`, visible or not
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Current layout box, or `None` when the element is not rendered
    async fn bounding_rect(&self, handle: &Self::Handle) -> Result<Option<BoundingRect>>;

    async fn click(&self, handle: &Self::Handle) -> Result<()>;

    /// Replace the element's value with `text`
    async fn fill(&self, handle: &Self::Handle, text: &str) -> Result<()>;

    async fn text_content(&self, handle: &Self::Handle) -> Result<Option<String>>;

    async fn attribute(&self, handle: &Self::Handle, name: &str) -> Result<Option<String>>;

    async fn is_enabled(&self, handle: &Self::Handle) -> Result<bool>;

    /// Checked state of a checkbox or radio button
    async fn is_checked(&self, handle: &Self::Handle) -> Result<bool>;

    /// Choose an option of a `<select>` and fire its change events
    async fn select_option(&self, handle: &Self::Handle, option: &SelectBy) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Capture a PNG of the page
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>>;

    /// Browser performance counters by name (`Nodes`, `JSHeapUsedSize`, ...)
    async fn performance_metrics(&self) -> Result<HashMap<String, f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_eq_within_one_unit() {
        let a = BoundingRect::new(10.0, 20.0, 100.0, 40.0);
        let b = BoundingRect::new(10.9, 19.2, 100.5, 40.99);
        assert!(a.approx_eq(&b));
        assert!(b.approx_eq(&a));
    }

    #[test]
    fn test_approx_eq_rejects_one_unit_shift() {
        let a = BoundingRect::new(10.0, 20.0, 100.0, 40.0);
        assert!(!a.approx_eq(&BoundingRect::new(11.0, 20.0, 100.0, 40.0)));
        assert!(!a.approx_eq(&BoundingRect::new(10.0, 20.0, 100.0, 41.5)));
    }

    #[test]
    fn test_center() {
        let rect = BoundingRect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(rect.center(), (50.0, 25.0));
    }
}
