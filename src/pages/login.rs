//! Login / signup page
//!
//! The page carries two forms side by side: log in with an existing account,
//! or start a new signup with a name and email.

use std::time::Duration;

use serde::Deserialize;

use crate::engine::Engine;
use crate::error::Result;
use crate::page::BasePage;
use crate::pages::SelectorCatalog;

pub const CATALOG: SelectorCatalog = SelectorCatalog::new(
    "login",
    &[
        ("login_email", "input[data-qa='login-email']"),
        ("login_password", "input[data-qa='login-password']"),
        ("login_button", "button[data-qa='login-button']"),
        ("login_form", "div.login-form > form[action='/login']"),
        ("signup_name", "input[data-qa='signup-name']"),
        ("signup_email", "input[data-qa='signup-email']"),
        ("signup_button", "button[data-qa='signup-button']"),
        ("signup_form", "div.signup-form > form[action='/signup']"),
    ],
);

pub const LOGIN_EMAIL_INPUT: &str = CATALOG.require("login_email");
pub const LOGIN_PASSWORD_INPUT: &str = CATALOG.require("login_password");
pub const LOGIN_BUTTON: &str = CATALOG.require("login_button");
pub const LOGIN_FORM: &str = CATALOG.require("login_form");
pub const SIGNUP_NAME_INPUT: &str = CATALOG.require("signup_name");
pub const SIGNUP_EMAIL_INPUT: &str = CATALOG.require("signup_email");
pub const SIGNUP_BUTTON: &str = CATALOG.require("signup_button");
pub const SIGNUP_FORM: &str = CATALOG.require("signup_form");

/// How long a submitted form may take to go away
pub const FORM_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignupData {
    pub name: String,
    pub email: String,
}

pub struct LoginPage<'p, E: Engine> {
    page: &'p BasePage<E>,
}

impl<'p, E: Engine> LoginPage<'p, E> {
    pub fn new(page: &'p BasePage<E>) -> Self {
        Self { page }
    }

    /// Fill the login form and submit it
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        self.input_login_email(email).await?;
        self.input_login_password(password).await?;
        self.click_login_button().await
    }

    /// Fill the signup form and submit it
    pub async fn signup(&self, name: &str, email: &str) -> Result<()> {
        self.input_signup_name(name).await?;
        self.input_signup_email(email).await?;
        self.click_signup_button().await
    }

    /// Log in and wait for the login form to disappear
    pub async fn complete_login(&self, credentials: &Credentials) -> Result<()> {
        self.login(&credentials.email, &credentials.password).await?;
        self.page.wait_for_hidden(LOGIN_FORM, Some(FORM_TIMEOUT)).await
    }

    /// Start a signup and wait for the signup form to disappear
    pub async fn complete_signup(&self, data: &SignupData) -> Result<()> {
        self.signup(&data.name, &data.email).await?;
        self.page.wait_for_hidden(SIGNUP_FORM, Some(FORM_TIMEOUT)).await
    }

    // Login form

    pub async fn is_login_form_visible(&self) -> bool {
        self.page.is_visible(LOGIN_FORM, None).await
    }

    pub async fn wait_for_login_form(&self, timeout: Option<Duration>) -> Result<()> {
        self.page
            .wait_for_visible(LOGIN_FORM, Some(timeout.unwrap_or(FORM_TIMEOUT)))
            .await
    }

    pub async fn input_login_email(&self, email: &str) -> Result<()> {
        self.page.type_text(LOGIN_EMAIL_INPUT, email, None).await
    }

    pub async fn is_login_email_visible(&self) -> bool {
        self.page.is_visible(LOGIN_EMAIL_INPUT, None).await
    }

    pub async fn input_login_password(&self, password: &str) -> Result<()> {
        self.page.type_text(LOGIN_PASSWORD_INPUT, password, None).await
    }

    pub async fn is_login_password_visible(&self) -> bool {
        self.page.is_visible(LOGIN_PASSWORD_INPUT, None).await
    }

    pub async fn click_login_button(&self) -> Result<()> {
        self.page.click(LOGIN_BUTTON, None).await
    }

    pub async fn is_login_button_visible(&self) -> bool {
        self.page.is_visible(LOGIN_BUTTON, None).await
    }

    pub async fn is_login_button_enabled(&self) -> bool {
        self.page.is_enabled(LOGIN_BUTTON, None).await
    }

    // Signup form

    pub async fn is_signup_form_visible(&self) -> bool {
        self.page.is_visible(SIGNUP_FORM, None).await
    }

    pub async fn wait_for_signup_form(&self, timeout: Option<Duration>) -> Result<()> {
        self.page
            .wait_for_visible(SIGNUP_FORM, Some(timeout.unwrap_or(FORM_TIMEOUT)))
            .await
    }

    pub async fn input_signup_name(&self, name: &str) -> Result<()> {
        self.page.type_text(SIGNUP_NAME_INPUT, name, None).await
    }

    pub async fn is_signup_name_visible(&self) -> bool {
        self.page.is_visible(SIGNUP_NAME_INPUT, None).await
    }

    pub async fn input_signup_email(&self, email: &str) -> Result<()> {
        self.page.type_text(SIGNUP_EMAIL_INPUT, email, None).await
    }

    pub async fn is_signup_email_visible(&self) -> bool {
        self.page.is_visible(SIGNUP_EMAIL_INPUT, None).await
    }

    pub async fn click_signup_button(&self) -> Result<()> {
        self.page.click(SIGNUP_BUTTON, None).await
    }

    pub async fn is_signup_button_visible(&self) -> bool {
        self.page.is_visible(SIGNUP_BUTTON, None).await
    }

    pub async fn is_signup_button_enabled(&self) -> bool {
        self.page.is_enabled(SIGNUP_BUTTON, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BoundingRect, ScriptedEngine, Tick};
    use crate::error::ErrorKind;
    use crate::ActionConfig;

    const RECT: BoundingRect = BoundingRect {
        x: 100.0,
        y: 300.0,
        width: 250.0,
        height: 34.0,
    };

    fn login_form(form_ticks: Vec<Tick>) -> ScriptedEngine {
        ScriptedEngine::new()
            .visible(LOGIN_EMAIL_INPUT, RECT)
            .visible(LOGIN_PASSWORD_INPUT, RECT)
            .visible(LOGIN_BUTTON, RECT)
            .element(LOGIN_FORM, form_ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_login() {
        let dir = tempfile::tempdir().unwrap();
        let page = BasePage::new(
            login_form(vec![Tick::Hidden]),
            ActionConfig::default().with_screenshot_dir(dir.path()),
        );
        let login = LoginPage::new(&page);

        login
            .complete_login(&Credentials {
                email: "ada@example.com".into(),
                password: "hunter2".into(),
            })
            .await
            .unwrap();

        assert_eq!(
            page.engine().fills(),
            vec![
                (LOGIN_EMAIL_INPUT.to_string(), "ada@example.com".to_string()),
                (LOGIN_PASSWORD_INPUT.to_string(), "hunter2".to_string()),
            ]
        );
        assert_eq!(page.engine().clicks(), vec![LOGIN_BUTTON.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_form_that_stays_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let page = BasePage::new(
            login_form(vec![Tick::Visible(RECT)]),
            ActionConfig::default().with_screenshot_dir(dir.path()),
        );
        let login = LoginPage::new(&page);

        let err = login
            .complete_login(&Credentials {
                email: "ada@example.com".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ActionFailure);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signup_form_visibility() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new()
            .visible(SIGNUP_FORM, RECT)
            .visible(SIGNUP_BUTTON, RECT)
            .disabled(SIGNUP_BUTTON);
        let page = BasePage::new(
            engine,
            ActionConfig::default().with_screenshot_dir(dir.path()),
        );
        let login = LoginPage::new(&page);

        assert!(login.is_signup_form_visible().await);
        assert!(!login.is_login_form_visible().await);
        assert!(login.is_signup_button_visible().await);
        assert!(!login.is_signup_button_enabled().await);
        login.wait_for_signup_form(None).await.unwrap();
    }
}
