//! Environment Configuration
//!
//! Settings live in a YAML file keyed by environment name:
//!
//! ```yaml
//! test:
//!   base_url: https://automationexercise.com
//!   timeout: 30000
//!   headless: true
//!   browser_type: chromium
//! ```
//!
//! Every key is required. A missing environment or key is an error, never a
//! silent default.

use std::path::Path;
use std::time::Duration;

use serde_yaml::Value;

use crate::error::{Error, Result};

/// Default location of the environment file, relative to the crate root
pub const DEFAULT_CONFIG_PATH: &str = "config/env.yaml";

/// Environment variable selecting the environment
pub const ENV_VAR: &str = "TEST_ENV";

/// Environment used when `TEST_ENV` is unset
pub const DEFAULT_ENV: &str = "test";

/// Settings for one environment
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    /// Name of the environment section these settings came from
    pub env: String,
    pub base_url: String,
    pub timeout: Duration,
    pub headless: bool,
    pub browser_type: String,
}

impl EnvConfig {
    /// Load the section for `env` from a YAML file
    pub fn load(path: impl AsRef<Path>, env: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, env, &path.display().to_string())
    }

    /// Load the section named by `TEST_ENV` (default `test`)
    pub fn from_env(path: impl AsRef<Path>) -> Result<Self> {
        let env = std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        Self::load(path, &env)
    }

    /// Parse the section for `env` out of YAML text; `source` names the text in errors
    pub fn parse(yaml: &str, env: &str, source: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(yaml)?;
        let section = root
            .get(env)
            .filter(|v| v.is_mapping())
            .ok_or_else(|| Error::UnknownEnvironment {
                env: env.to_string(),
                path: source.to_string(),
            })?;

        let field = |key: &str| required(section, env, key);
        let invalid = |key: &str, expected: &str| Error::ConfigInvalid {
            key: key.to_string(),
            message: format!("expected {}", expected),
        };

        let base_url = field("base_url")?
            .as_str()
            .ok_or_else(|| invalid("base_url", "a string"))?
            .to_string();
        let timeout_ms = field("timeout")?
            .as_u64()
            .ok_or_else(|| invalid("timeout", "milliseconds as a non-negative integer"))?;
        let headless = field("headless")?
            .as_bool()
            .ok_or_else(|| invalid("headless", "a boolean"))?;
        let browser_type = field("browser_type")?
            .as_str()
            .ok_or_else(|| invalid("browser_type", "a string"))?
            .to_string();

        Ok(Self {
            env: env.to_string(),
            base_url,
            timeout: Duration::from_millis(timeout_ms),
            headless,
            browser_type,
        })
    }

    /// Join `path` onto the base URL; an empty path yields the base URL itself
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

fn required<'v>(section: &'v Value, env: &str, key: &str) -> Result<&'v Value> {
    section
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::config_missing(env, key))
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const YAML: &str = r#"
test:
  base_url: https://automationexercise.com/
  timeout: 30000
  headless: true
  browser_type: chromium
staging:
  base_url: https://staging.example.com
  headless: false
  browser_type: chromium
"#;

    #[test]
    fn test_parse_complete_section() {
        let config = EnvConfig::parse(YAML, "test", "env.yaml").unwrap();
        assert_eq!(config.env, "test");
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert!(config.headless);
        assert_eq!(config.browser_type, "chromium");
    }

    #[test]
    fn test_missing_key_fails_loudly() {
        let err = EnvConfig::parse(YAML, "staging", "env.yaml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
        assert!(matches!(
            err,
            Error::ConfigMissing { ref env, ref key } if env == "staging" && key == "timeout"
        ));
    }

    #[test]
    fn test_unknown_environment() {
        let err = EnvConfig::parse(YAML, "prod", "env.yaml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
        assert!(err.to_string().contains("prod"));
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let yaml = "test:\n  base_url: x\n  timeout: soon\n  headless: true\n  browser_type: chromium\n";
        let err = EnvConfig::parse(yaml, "test", "inline").unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { ref key, .. } if key == "timeout"));
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    }

    #[test]
    fn test_url_for() {
        let config = EnvConfig::parse(YAML, "test", "env.yaml").unwrap();
        assert_eq!(config.url_for(""), "https://automationexercise.com");
        assert_eq!(config.url_for("/login"), "https://automationexercise.com/login");
        assert_eq!(config.url_for("login"), "https://automationexercise.com/login");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.yaml");
        std::fs::write(&path, YAML).unwrap();
        let config = EnvConfig::load(&path, "test").unwrap();
        assert_eq!(config.base_url, "https://automationexercise.com/");
    }
}
