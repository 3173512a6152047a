//! Error types for storefront-e2e

use thiserror::Error;

/// Result type for storefront-e2e operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
///
/// Test suites branch on the kind rather than on individual variants: a
/// `LocateTimeout` means the page never showed the element, an
/// `ActionFailure` means the engine rejected an operation on something
/// that was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LocateTimeout,
    StabilityTimeout,
    ActionFailure,
    /// Environment or key absent, or a value of the wrong shape
    ConfigMissing,
    Other,
}

/// Error type for storefront-e2e
#[derive(Debug, Error)]
pub enum Error {
    /// Selector never became visible within the retry budget
    #[error("Element '{selector}' not visible after {attempts} attempts: {last_error}")]
    LocateTimeout {
        selector: String,
        attempts: u32,
        last_error: String,
    },

    /// Element geometry never settled before the deadline
    #[error("Element '{selector}' did not stabilize within {waited_ms}ms (stable samples: {stable_count})")]
    StabilityTimeout {
        selector: String,
        waited_ms: u64,
        stable_count: u32,
    },

    /// Required configuration key absent
    #[error("Missing configuration key '{key}' for environment '{env}'")]
    ConfigMissing { env: String, key: String },

    /// Configuration file has no section for the environment
    #[error("Unknown environment '{env}' in {path}")]
    UnknownEnvironment { env: String, path: String },

    /// Configuration value present but of the wrong shape
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigInvalid { key: String, message: String },

    /// Page object asked for a selector its catalog does not define
    #[error("Selector '{name}' is not defined for page '{page}'")]
    UnknownSelector { page: String, name: String },

    /// Failed to launch Chrome
    #[error("Failed to launch Chrome: {0}")]
    Launch(String),

    /// Transport error
    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// CDP protocol error
    #[error("CDP error in {method}: {message} (code {code})")]
    Cdp {
        method: String,
        code: i64,
        message: String,
    },

    /// Engine failure that is not tied to a protocol method
    #[error("Engine error: {0}")]
    Engine(String),

    /// Navigation error
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Element not found in DOM
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Element exists in DOM but is not visible/rendered
    #[error("Element not visible: '{selector}' exists in DOM but is not rendered (hidden, display:none, or off-screen)")]
    ElementNotVisible { selector: String },

    /// Timeout reported by the engine
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV parse error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Test fixture row is missing a column or holds malformed data
    #[error("Invalid test data: {0}")]
    Data(String),

    /// Decode error (e.g., base64)
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Chrome not found
    #[error("Chrome not found")]
    ChromeNotFound,
}

impl Error {
    /// Create a transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    /// Create a transport error with IO source
    pub fn transport_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create a CDP error with full context
    pub fn cdp(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Create a missing-key configuration error
    pub fn config_missing(env: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ConfigMissing {
            env: env.into(),
            key: key.into(),
        }
    }

    /// Create an element not visible error
    pub fn not_visible(selector: impl Into<String>) -> Self {
        Self::ElementNotVisible {
            selector: selector.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LocateTimeout { .. } => ErrorKind::LocateTimeout,
            Error::StabilityTimeout { .. } => ErrorKind::StabilityTimeout,
            Error::ConfigMissing { .. }
            | Error::ConfigInvalid { .. }
            | Error::UnknownEnvironment { .. } => ErrorKind::ConfigMissing,
            Error::Transport { .. }
            | Error::Cdp { .. }
            | Error::Engine(_)
            | Error::Navigation(_)
            | Error::ElementNotFound(_)
            | Error::ElementNotVisible { .. }
            | Error::Timeout(_) => ErrorKind::ActionFailure,
            _ => ErrorKind::Other,
        }
    }
}
