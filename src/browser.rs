//! Browser Launcher
//!
//! Finds a Chrome/Chromium binary, starts it with remote debugging enabled,
//! and opens pages wrapped in a [`BasePage`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::cdp::{Connection, Transport};
use crate::chrome::ChromeEngine;
use crate::config::EnvConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::page::BasePage;
use crate::ActionConfig;

/// Overrides binary discovery when set
pub const CHROME_PATH_VAR: &str = "CHROME_PATH";

/// Browser types this launcher can drive
pub const SUPPORTED_BROWSERS: &[&str] = &["chromium", "chrome"];

const VIEWPORT: (u32, u32) = (1920, 1080);

/// How long to wait for Chrome to print its DevTools endpoint
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-process counter for unique profile directories
static BROWSER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Locate a Chrome/Chromium binary, honouring `CHROME_PATH`
pub fn find_chrome() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CHROME_PATH_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at missing file {:?}", CHROME_PATH_VAR, path);
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "linux") {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[]
    };

    candidates
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .ok_or(Error::ChromeNotFound)
}

/// Command-line flags for a test browser
fn launch_args(headless: bool, user_data_dir: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-dev-shm-usage",
        "--disable-background-timer-throttling",
        "--disable-renderer-backgrounding",
        "--disable-popup-blocking",
        "--disable-sync",
        "--disable-translate",
        "--password-store=basic",
        "--use-mock-keychain",
        "--no-sandbox",
        "--remote-debugging-port=0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(format!("--window-size={},{}", VIEWPORT.0, VIEWPORT.1));
    args.push(format!("--user-data-dir={}", user_data_dir.display()));
    if headless {
        args.push("--headless=new".into());
    }
    args
}

/// Pull the endpoint out of `DevTools listening on ws://...`
fn parse_devtools_line(line: &str) -> Option<&str> {
    if !line.contains("DevTools listening on") {
        return None;
    }
    line.find("ws://").map(|start| line[start..].trim())
}

/// Spawn Chrome and read its DevTools WebSocket URL from stderr
async fn launch_chrome(path: &Path, args: &[String]) -> Result<(Child, String)> {
    let mut child = Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Launch(format!("Failed to launch {}: {}", path.display(), e)))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Launch("No stderr from Chrome".into()))?;
    let mut lines = BufReader::new(stderr).lines();

    let ws_url = tokio::time::timeout(LAUNCH_TIMEOUT, async {
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::trace!("Chrome stderr: {}", line);
            if let Some(url) = parse_devtools_line(&line) {
                return Some(url.to_string());
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
    .ok_or_else(|| Error::Launch("Failed to get DevTools WebSocket URL from Chrome".into()))?;

    // Keep draining so Chrome never blocks on a full pipe
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::trace!("Chrome stderr: {}", line);
        }
    });

    tracing::info!("Chrome DevTools URL: {}", ws_url);
    Ok((child, ws_url))
}

/// A running browser process
pub struct Browser {
    connection: Connection,
    child: Child,
    user_data_dir: PathBuf,
}

impl Browser {
    /// Launch the browser described by `env`
    pub async fn launch(env: &EnvConfig) -> Result<Self> {
        if !SUPPORTED_BROWSERS.contains(&env.browser_type.as_str()) {
            return Err(Error::Launch(format!(
                "Unsupported browser type '{}' (expected one of: {})",
                env.browser_type,
                SUPPORTED_BROWSERS.join(", ")
            )));
        }

        let chrome_path = find_chrome()?;

        let instance = BROWSER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "storefront-e2e-{}-{}",
            std::process::id(),
            instance
        ));
        let _ = std::fs::remove_dir_all(&user_data_dir);
        std::fs::create_dir_all(&user_data_dir)?;

        tracing::info!(
            env = %env.env,
            headless = env.headless,
            "Launching {:?}",
            chrome_path
        );
        let (child, ws_url) =
            launch_chrome(&chrome_path, &launch_args(env.headless, &user_data_dir)).await?;

        let connection = Connection::new(Transport::connect(&ws_url)?);
        let version = connection.version().await?;
        tracing::info!("Connected to {}", version.product);

        Ok(Self {
            connection,
            child,
            user_data_dir,
        })
    }

    /// Open a blank tab and return its engine
    pub async fn new_engine(&self) -> Result<ChromeEngine> {
        let target_id = self
            .connection
            .create_target("about:blank", VIEWPORT.0, VIEWPORT.1)
            .await?;
        let session = self.connection.attach_to_target(&target_id).await?;
        session.page_enable().await?;
        tracing::debug!("Attached to target {}", target_id);
        Ok(ChromeEngine::new(session))
    }

    /// Open a blank tab wrapped in a [`BasePage`] that logs through `tracing`
    pub async fn new_page(&self, config: ActionConfig) -> Result<BasePage<ChromeEngine>> {
        Ok(BasePage::new(self.new_engine().await?, config))
    }

    /// Open a blank tab reporting to `diagnostics`
    pub async fn new_page_with_diagnostics(
        &self,
        config: ActionConfig,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<BasePage<ChromeEngine>> {
        Ok(BasePage::with_diagnostics(
            self.new_engine().await?,
            config,
            diagnostics,
        ))
    }

    /// Close a page's tab
    pub async fn close_page(&self, page: BasePage<ChromeEngine>) -> Result<()> {
        let target_id = page.engine().session().target_id().to_string();
        self.connection.close_target(&target_id).await?;
        Ok(())
    }

    /// Shut the browser down and remove its profile directory
    pub async fn close(mut self) -> Result<()> {
        self.connection.close().await;
        if tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .is_err()
        {
            tracing::warn!("Chrome did not exit, killing it");
            let _ = self.child.kill().await;
        }
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
        Ok(())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devtools_line() {
        let line = "DevTools listening on ws://127.0.0.1:41235/devtools/browser/6f1c\n";
        assert_eq!(
            parse_devtools_line(line),
            Some("ws://127.0.0.1:41235/devtools/browser/6f1c")
        );
        assert_eq!(parse_devtools_line("[0101/000000.0:ERROR] something"), None);
    }

    #[test]
    fn test_launch_args_respect_headless() {
        let dir = Path::new("/tmp/profile");
        let headless = launch_args(true, dir);
        assert!(headless.contains(&"--headless=new".to_string()));
        assert!(headless.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert!(headless.contains(&"--remote-debugging-port=0".to_string()));

        let headed = launch_args(false, dir);
        assert!(!headed.iter().any(|a| a.starts_with("--headless")));
    }

    #[tokio::test]
    async fn test_unsupported_browser_type() {
        let env = EnvConfig {
            env: "test".into(),
            base_url: "https://shop.test".into(),
            timeout: Duration::from_secs(1),
            headless: true,
            browser_type: "firefox".into(),
        };
        match Browser::launch(&env).await {
            Err(Error::Launch(message)) => assert!(message.contains("firefox")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("firefox should be rejected"),
        }
    }
}
