//! # Storefront E2E
//!
//! Resilient element interaction for browser end-to-end tests.
//!
//! Every page object sits on a [`BasePage`], which wraps an [`Engine`] with:
//!
//! - **Locate with retry** - a selector is looked up a bounded number of times
//!   before the lookup is declared failed
//! - **Stability gate** - clicks wait until the target's layout box has
//!   stopped moving
//! - **Failure capture** - a failing action saves one full-page screenshot and
//!   reports it to the [`Diagnostics`] sink before returning the original error
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storefront_e2e::{ActionConfig, Browser, EnvConfig};
//! use storefront_e2e::pages::HomePage;
//!
//! #[tokio::main]
//! async fn main() -> storefront_e2e::Result<()> {
//!     let env = EnvConfig::from_env(storefront_e2e::config::DEFAULT_CONFIG_PATH)?;
//!     let browser = Browser::launch(&env).await?;
//!     let page = browser.new_page(ActionConfig::from_env_config(&env)).await?;
//!
//!     let home = HomePage::new(&page);
//!     home.goto(&env.base_url).await?;
//!     home.click_signup_login().await?;
//!
//!     browser.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! Tests that should not need a browser use [`ScriptedEngine`] instead:
//!
//! ```rust
//! use storefront_e2e::{ActionConfig, BasePage};
//! use storefront_e2e::engine::{BoundingRect, ScriptedEngine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> storefront_e2e::Result<()> {
//! let engine = ScriptedEngine::new()
//!     .visible("h2.title", BoundingRect::new(0.0, 0.0, 200.0, 30.0))
//!     .text("h2.title", "ACCOUNT CREATED!");
//! let page = BasePage::new(engine, ActionConfig::default());
//! assert_eq!(page.get_text("h2.title", None).await?, "ACCOUNT CREATED!");
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub mod browser;
pub mod capture;
pub mod cdp;
pub mod chrome;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod locator;
pub mod page;
pub mod pages;

// Re-exports
pub use browser::Browser;
pub use capture::{FailureArtifact, FailureCapture};
pub use chrome::ChromeEngine;
pub use config::EnvConfig;
pub use diagnostics::{DiagnosticEvent, Diagnostics, MemoryDiagnostics, TracingDiagnostics};
pub use engine::{BoundingRect, Engine, ScriptedEngine};
pub use error::{Error, ErrorKind, Result};
pub use locator::{RetryBudget, StabilityConfig};
pub use page::BasePage;

/// Default per-action timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Tuning for [`BasePage`] actions
#[derive(Debug, Clone, PartialEq)]
pub struct ActionConfig {
    /// Used by every action that is not given an explicit timeout
    pub timeout: Duration,
    pub retry: RetryBudget,
    pub stability: StabilityConfig,
    /// Where failure screenshots are written
    pub screenshot_dir: PathBuf,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryBudget::default(),
            stability: StabilityConfig::default(),
            screenshot_dir: PathBuf::from(capture::DEFAULT_SCREENSHOT_DIR),
        }
    }
}

impl ActionConfig {
    /// Defaults with the timeout taken from the environment file
    pub fn from_env_config(env: &EnvConfig) -> Self {
        Self {
            timeout: env.timeout,
            ..Default::default()
        }
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ActionConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.interval, Duration::from_secs(1));
        assert_eq!(config.stability.check_interval, Duration::from_millis(100));
        assert_eq!(config.stability.threshold, 3);
        assert_eq!(config.screenshot_dir, PathBuf::from("output/screenshots"));
    }

    #[test]
    fn test_from_env_config() {
        let env = EnvConfig {
            env: "test".into(),
            base_url: "https://shop.test".into(),
            timeout: Duration::from_millis(5_000),
            headless: true,
            browser_type: "chromium".into(),
        };
        let config = ActionConfig::from_env_config(&env).with_screenshot_dir("shots");
        assert_eq!(config.timeout, Duration::from_millis(5_000));
        assert_eq!(config.retry, RetryBudget::default());
        assert_eq!(config.screenshot_dir, PathBuf::from("shots"));
    }
}
