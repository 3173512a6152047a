//! Storefront home page

use crate::engine::Engine;
use crate::error::Result;
use crate::page::BasePage;
use crate::pages::SelectorCatalog;

pub const CATALOG: SelectorCatalog = SelectorCatalog::new(
    "home",
    &[
        ("products_link", "a[href='/products']"),
        ("view_cart_button", "a[href='/view_cart']"),
        ("login_signup_button", "a[href='/login']"),
        ("logout_button", "a[href='/logout']"),
        ("delete_account_button", "a[href='/delete_account']"),
        ("test_cases_link", "a[href='/test_cases']"),
        ("api_list_link", "a[href='/api_list']"),
        ("youtube_channel_link", "a[href='https://www.youtube.com/c/AutomationExercise']"),
        ("contact_us_button", "a[href='/contact_us']"),
        ("home_link", "a[href='/']"),
    ],
);

pub const PRODUCTS_LINK: &str = CATALOG.require("products_link");
pub const VIEW_CART_BUTTON: &str = CATALOG.require("view_cart_button");
pub const LOGIN_SIGNUP_BUTTON: &str = CATALOG.require("login_signup_button");
pub const LOGOUT_BUTTON: &str = CATALOG.require("logout_button");
pub const DELETE_ACCOUNT_BUTTON: &str = CATALOG.require("delete_account_button");
pub const TEST_CASES_LINK: &str = CATALOG.require("test_cases_link");
pub const API_LIST_LINK: &str = CATALOG.require("api_list_link");
pub const YOUTUBE_CHANNEL_LINK: &str = CATALOG.require("youtube_channel_link");
pub const CONTACT_US_BUTTON: &str = CATALOG.require("contact_us_button");
pub const HOME_LINK: &str = CATALOG.require("home_link");

/// Landing page with the site header navigation
pub struct HomePage<'p, E: Engine> {
    page: &'p BasePage<E>,
}

impl<'p, E: Engine> HomePage<'p, E> {
    pub fn new(page: &'p BasePage<E>) -> Self {
        Self { page }
    }

    /// Open the home page under `base_url`
    pub async fn goto(&self, base_url: &str) -> Result<()> {
        self.page.goto_path(base_url, "/").await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.page.current_url().await
    }

    pub async fn is_login_button_visible(&self) -> bool {
        self.page.is_visible(LOGIN_SIGNUP_BUTTON, None).await
    }

    pub async fn click_signup_login(&self) -> Result<()> {
        self.page.click(LOGIN_SIGNUP_BUTTON, None).await
    }

    pub async fn is_products_link_visible(&self) -> bool {
        self.page.is_visible(PRODUCTS_LINK, None).await
    }

    pub async fn click_products_link(&self) -> Result<()> {
        self.page.click(PRODUCTS_LINK, None).await
    }

    pub async fn is_view_cart_visible(&self) -> bool {
        self.page.is_visible(VIEW_CART_BUTTON, None).await
    }

    pub async fn click_view_cart(&self) -> Result<()> {
        self.page.click(VIEW_CART_BUTTON, None).await
    }

    pub async fn is_test_cases_link_visible(&self) -> bool {
        self.page.is_visible(TEST_CASES_LINK, None).await
    }

    pub async fn navigate_to_test_cases(&self) -> Result<()> {
        self.page.click(TEST_CASES_LINK, None).await
    }

    pub async fn is_api_docs_link_visible(&self) -> bool {
        self.page.is_visible(API_LIST_LINK, None).await
    }

    pub async fn click_api_docs(&self) -> Result<()> {
        self.page.click(API_LIST_LINK, None).await
    }

    pub async fn is_youtube_link_visible(&self) -> bool {
        self.page.is_visible(YOUTUBE_CHANNEL_LINK, None).await
    }

    /// Follow the channel link; it opens a new tab on the live site
    pub async fn open_youtube_channel(&self) -> Result<()> {
        self.page.click(YOUTUBE_CHANNEL_LINK, None).await
    }

    pub async fn is_contact_us_visible(&self) -> bool {
        self.page.is_visible(CONTACT_US_BUTTON, None).await
    }

    pub async fn click_contact_us(&self) -> Result<()> {
        self.page.click(CONTACT_US_BUTTON, None).await
    }

    pub async fn is_home_link_visible(&self) -> bool {
        self.page.is_visible(HOME_LINK, None).await
    }

    pub async fn navigate_to_home(&self) -> Result<()> {
        self.page.click(HOME_LINK, None).await
    }

    pub async fn is_logout_visible(&self) -> bool {
        self.page.is_visible(LOGOUT_BUTTON, None).await
    }

    pub async fn click_logout(&self) -> Result<()> {
        self.page.click(LOGOUT_BUTTON, None).await
    }

    pub async fn is_delete_account_visible(&self) -> bool {
        self.page.is_visible(DELETE_ACCOUNT_BUTTON, None).await
    }

    pub async fn click_delete_account(&self) -> Result<()> {
        self.page.click(DELETE_ACCOUNT_BUTTON, None).await
    }
}
