//! Confirmation page shown once an account exists

use std::time::Duration;

use crate::engine::Engine;
use crate::error::Result;
use crate::page::BasePage;
use crate::pages::SelectorCatalog;

pub const CATALOG: SelectorCatalog = SelectorCatalog::new(
    "account_created",
    &[
        ("title", "h2[data-qa='account-created']"),
        ("congratulations", "div.col-sm-9 p:nth-of-type(1)"),
        ("privileges", "div.col-sm-9 p:nth-of-type(2)"),
        ("continue_button", "a[data-qa='continue-button']"),
    ],
);

pub const ACCOUNT_CREATED_TITLE: &str = CATALOG.require("title");
pub const CONGRATULATIONS_TEXT: &str = CATALOG.require("congratulations");
pub const PRIVILEGES_TEXT: &str = CATALOG.require("privileges");
pub const CONTINUE_BUTTON: &str = CATALOG.require("continue_button");

const LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AccountCreatedPage<'p, E: Engine> {
    page: &'p BasePage<E>,
}

impl<'p, E: Engine> AccountCreatedPage<'p, E> {
    pub fn new(page: &'p BasePage<E>) -> Self {
        Self { page }
    }

    pub async fn title(&self) -> Result<String> {
        self.page.wait_for_visible(ACCOUNT_CREATED_TITLE, None).await?;
        self.page.get_text(ACCOUNT_CREATED_TITLE, None).await
    }

    pub async fn is_title_visible(&self) -> bool {
        self.page.is_visible(ACCOUNT_CREATED_TITLE, None).await
    }

    pub async fn congratulations_text(&self) -> Result<String> {
        self.page.wait_for_visible(CONGRATULATIONS_TEXT, None).await?;
        self.page.get_text(CONGRATULATIONS_TEXT, None).await
    }

    pub async fn is_congratulations_text_visible(&self) -> bool {
        self.page.is_visible(CONGRATULATIONS_TEXT, None).await
    }

    pub async fn privileges_text(&self) -> Result<String> {
        self.page.wait_for_visible(PRIVILEGES_TEXT, None).await?;
        self.page.get_text(PRIVILEGES_TEXT, None).await
    }

    pub async fn is_privileges_text_visible(&self) -> bool {
        self.page.is_visible(PRIVILEGES_TEXT, None).await
    }

    pub async fn click_continue_button(&self) -> Result<()> {
        self.page.click(CONTINUE_BUTTON, None).await
    }

    pub async fn is_continue_button_visible(&self) -> bool {
        self.page.is_visible(CONTINUE_BUTTON, None).await
    }

    /// Continue and wait until the confirmation page has been left
    pub async fn continue_to_homepage(&self) -> Result<()> {
        self.click_continue_button().await?;
        self.page
            .wait_for_hidden(CONTINUE_BUTTON, Some(LEAVE_TIMEOUT))
            .await
    }
}
