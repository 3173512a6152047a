//! Account information page shown after a signup is started

use std::time::Duration;

use serde::Deserialize;

use crate::data::Row;
use crate::engine::{Engine, SelectBy};
use crate::error::{Error, Result};
use crate::page::BasePage;
use crate::pages::SelectorCatalog;

pub const CATALOG: SelectorCatalog = SelectorCatalog::new(
    "register",
    &[
        ("signup_form", "div.login-form > form[action='/signup']"),
        ("title_mr", "input[id='id_gender1']"),
        ("title_mrs", "input[id='id_gender2']"),
        ("name", "input[data-qa='name']"),
        ("email", "input[data-qa='email']"),
        ("password", "input[data-qa='password']"),
        ("days", "select[data-qa='days']"),
        ("months", "select[data-qa='months']"),
        ("years", "select[data-qa='years']"),
        ("newsletter", "input[id='newsletter']"),
        ("special_offers", "input[id='optin']"),
        ("first_name", "input[data-qa='first_name']"),
        ("last_name", "input[data-qa='last_name']"),
        ("company", "input[data-qa='company']"),
        ("address", "input[data-qa='address']"),
        ("address2", "input[data-qa='address2']"),
        ("country", "select[data-qa='country']"),
        ("state", "input[data-qa='state']"),
        ("city", "input[data-qa='city']"),
        ("zipcode", "input[data-qa='zipcode']"),
        ("mobile_number", "input[data-qa='mobile_number']"),
        ("create_account", "button[data-qa='create-account']"),
    ],
);

pub const SIGNUP_FORM: &str = CATALOG.require("signup_form");
pub const TITLE_MR: &str = CATALOG.require("title_mr");
pub const TITLE_MRS: &str = CATALOG.require("title_mrs");
pub const NAME_INPUT: &str = CATALOG.require("name");
pub const EMAIL_INPUT: &str = CATALOG.require("email");
pub const PASSWORD_INPUT: &str = CATALOG.require("password");
pub const DAYS_SELECT: &str = CATALOG.require("days");
pub const MONTHS_SELECT: &str = CATALOG.require("months");
pub const YEARS_SELECT: &str = CATALOG.require("years");
pub const NEWSLETTER_CHECKBOX: &str = CATALOG.require("newsletter");
pub const SPECIAL_OFFERS_CHECKBOX: &str = CATALOG.require("special_offers");
pub const FIRST_NAME_INPUT: &str = CATALOG.require("first_name");
pub const LAST_NAME_INPUT: &str = CATALOG.require("last_name");
pub const COMPANY_INPUT: &str = CATALOG.require("company");
pub const ADDRESS_INPUT: &str = CATALOG.require("address");
pub const ADDRESS2_INPUT: &str = CATALOG.require("address2");
pub const COUNTRY_SELECT: &str = CATALOG.require("country");
pub const STATE_INPUT: &str = CATALOG.require("state");
pub const CITY_INPUT: &str = CATALOG.require("city");
pub const ZIPCODE_INPUT: &str = CATALOG.require("zipcode");
pub const MOBILE_NUMBER_INPUT: &str = CATALOG.require("mobile_number");
pub const CREATE_ACCOUNT_BUTTON: &str = CATALOG.require("create_account");

pub const FORM_TIMEOUT: Duration = Duration::from_secs(15);

/// Account creation redirects through the server; allow it longer
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Title {
    #[default]
    Mr,
    Mrs,
}

/// Account details entered on the registration form
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrationData {
    #[serde(default)]
    pub title: Title,
    pub password: String,
    /// Option values, e.g. `"15"`, `"6"`, `"1990"`
    pub birth_day: String,
    pub birth_month: String,
    pub birth_year: String,
    #[serde(default)]
    pub newsletter: bool,
    #[serde(default)]
    pub special_offers: bool,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: String,
    pub address: String,
    #[serde(default)]
    pub address2: String,
    /// Visible label of the country option
    pub country: String,
    pub state: String,
    pub city: String,
    pub zipcode: String,
    pub mobile_number: String,
}

impl RegistrationData {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One row of `register_data.csv`: signup name/email plus a JSON `user_data` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFixture {
    pub name: String,
    pub email: String,
    pub user_data: RegistrationData,
}

impl RegistrationFixture {
    pub fn from_row(row: &Row) -> Result<Self> {
        let column = |key: &str| {
            row.get(key)
                .cloned()
                .ok_or_else(|| Error::Data(format!("missing column '{}'", key)))
        };
        Ok(Self {
            name: column("name")?,
            email: column("email")?,
            user_data: RegistrationData::from_json(&column("user_data")?)?,
        })
    }
}

pub struct RegisterPage<'p, E: Engine> {
    page: &'p BasePage<E>,
}

impl<'p, E: Engine> RegisterPage<'p, E> {
    pub fn new(page: &'p BasePage<E>) -> Self {
        Self { page }
    }

    /// Fill every field of the form, submit it, and wait for the form to go away
    pub async fn complete_registration(&self, name: &str, data: &RegistrationData) -> Result<()> {
        match data.title {
            Title::Mr => self.click_title_mr().await?,
            Title::Mrs => self.click_title_mrs().await?,
        }

        self.input_name(name).await?;
        self.input_password(&data.password).await?;

        self.select_birth_day(&data.birth_day).await?;
        self.select_birth_month(&data.birth_month).await?;
        self.select_birth_year(&data.birth_year).await?;

        if data.newsletter {
            self.check_newsletter().await?;
        }
        if data.special_offers {
            self.check_special_offers().await?;
        }

        self.input_first_name(&data.first_name).await?;
        self.input_last_name(&data.last_name).await?;
        self.input_company(&data.company).await?;
        self.input_address(&data.address).await?;
        self.input_address2(&data.address2).await?;
        self.select_country(&data.country).await?;
        self.input_state(&data.state).await?;
        self.input_city(&data.city).await?;
        self.input_zipcode(&data.zipcode).await?;
        self.input_mobile_number(&data.mobile_number).await?;

        self.click_create_account().await?;
        self.page
            .wait_for_hidden(SIGNUP_FORM, Some(SUBMIT_TIMEOUT))
            .await
    }

    pub async fn is_signup_form_visible(&self) -> bool {
        self.page.is_visible(SIGNUP_FORM, None).await
    }

    pub async fn wait_for_signup_form(&self, timeout: Option<Duration>) -> Result<()> {
        self.page
            .wait_for_visible(SIGNUP_FORM, Some(timeout.unwrap_or(FORM_TIMEOUT)))
            .await
    }

    // Title

    pub async fn click_title_mr(&self) -> Result<()> {
        self.page.click(TITLE_MR, None).await
    }

    pub async fn is_title_mr_visible(&self) -> bool {
        self.page.is_visible(TITLE_MR, None).await
    }

    pub async fn is_title_mr_checked(&self) -> bool {
        self.page.is_checked(TITLE_MR, None).await
    }

    pub async fn click_title_mrs(&self) -> Result<()> {
        self.page.click(TITLE_MRS, None).await
    }

    pub async fn is_title_mrs_visible(&self) -> bool {
        self.page.is_visible(TITLE_MRS, None).await
    }

    pub async fn is_title_mrs_checked(&self) -> bool {
        self.page.is_checked(TITLE_MRS, None).await
    }

    // Account

    pub async fn input_name(&self, text: &str) -> Result<()> {
        self.page.type_text(NAME_INPUT, text, None).await
    }

    pub async fn is_name_input_visible(&self) -> bool {
        self.page.is_visible(NAME_INPUT, None).await
    }

    pub async fn input_email(&self, text: &str) -> Result<()> {
        self.page.type_text(EMAIL_INPUT, text, None).await
    }

    pub async fn is_email_input_visible(&self) -> bool {
        self.page.is_visible(EMAIL_INPUT, None).await
    }

    /// The email carried over from signup is read-only here
    pub async fn is_email_input_disabled(&self) -> bool {
        self.page.is_disabled(EMAIL_INPUT, None).await
    }

    pub async fn input_password(&self, text: &str) -> Result<()> {
        self.page.type_text(PASSWORD_INPUT, text, None).await
    }

    pub async fn is_password_input_visible(&self) -> bool {
        self.page.is_visible(PASSWORD_INPUT, None).await
    }

    // Date of birth

    pub async fn select_birth_day(&self, day: &str) -> Result<()> {
        self.page
            .select_option(DAYS_SELECT, SelectBy::value(day), None)
            .await
    }

    pub async fn is_days_select_visible(&self) -> bool {
        self.page.is_visible(DAYS_SELECT, None).await
    }

    pub async fn select_birth_month(&self, month: &str) -> Result<()> {
        self.page
            .select_option(MONTHS_SELECT, SelectBy::value(month), None)
            .await
    }

    pub async fn is_months_select_visible(&self) -> bool {
        self.page.is_visible(MONTHS_SELECT, None).await
    }

    pub async fn select_birth_year(&self, year: &str) -> Result<()> {
        self.page
            .select_option(YEARS_SELECT, SelectBy::value(year), None)
            .await
    }

    pub async fn is_years_select_visible(&self) -> bool {
        self.page.is_visible(YEARS_SELECT, None).await
    }

    // Subscriptions

    pub async fn check_newsletter(&self) -> Result<()> {
        self.page.check(NEWSLETTER_CHECKBOX, None).await
    }

    pub async fn is_newsletter_visible(&self) -> bool {
        self.page.is_visible(NEWSLETTER_CHECKBOX, None).await
    }

    pub async fn is_newsletter_checked(&self) -> bool {
        self.page.is_checked(NEWSLETTER_CHECKBOX, None).await
    }

    pub async fn check_special_offers(&self) -> Result<()> {
        self.page.check(SPECIAL_OFFERS_CHECKBOX, None).await
    }

    pub async fn is_special_offers_visible(&self) -> bool {
        self.page.is_visible(SPECIAL_OFFERS_CHECKBOX, None).await
    }

    pub async fn is_special_offers_checked(&self) -> bool {
        self.page.is_checked(SPECIAL_OFFERS_CHECKBOX, None).await
    }

    // Address

    pub async fn input_first_name(&self, text: &str) -> Result<()> {
        self.page.type_text(FIRST_NAME_INPUT, text, None).await
    }

    pub async fn is_first_name_visible(&self) -> bool {
        self.page.is_visible(FIRST_NAME_INPUT, None).await
    }

    pub async fn input_last_name(&self, text: &str) -> Result<()> {
        self.page.type_text(LAST_NAME_INPUT, text, None).await
    }

    pub async fn is_last_name_visible(&self) -> bool {
        self.page.is_visible(LAST_NAME_INPUT, None).await
    }

    pub async fn input_company(&self, text: &str) -> Result<()> {
        self.page.type_text(COMPANY_INPUT, text, None).await
    }

    pub async fn is_company_visible(&self) -> bool {
        self.page.is_visible(COMPANY_INPUT, None).await
    }

    pub async fn input_address(&self, text: &str) -> Result<()> {
        self.page.type_text(ADDRESS_INPUT, text, None).await
    }

    pub async fn is_address_visible(&self) -> bool {
        self.page.is_visible(ADDRESS_INPUT, None).await
    }

    pub async fn input_address2(&self, text: &str) -> Result<()> {
        self.page.type_text(ADDRESS2_INPUT, text, None).await
    }

    pub async fn is_address2_visible(&self) -> bool {
        self.page.is_visible(ADDRESS2_INPUT, None).await
    }

    pub async fn select_country(&self, country: &str) -> Result<()> {
        self.page
            .select_option(COUNTRY_SELECT, SelectBy::label(country), None)
            .await
    }

    pub async fn is_country_select_visible(&self) -> bool {
        self.page.is_visible(COUNTRY_SELECT, None).await
    }

    pub async fn input_state(&self, text: &str) -> Result<()> {
        self.page.type_text(STATE_INPUT, text, None).await
    }

    pub async fn is_state_visible(&self) -> bool {
        self.page.is_visible(STATE_INPUT, None).await
    }

    pub async fn input_city(&self, text: &str) -> Result<()> {
        self.page.type_text(CITY_INPUT, text, None).await
    }

    pub async fn is_city_visible(&self) -> bool {
        self.page.is_visible(CITY_INPUT, None).await
    }

    pub async fn input_zipcode(&self, text: &str) -> Result<()> {
        self.page.type_text(ZIPCODE_INPUT, text, None).await
    }

    pub async fn is_zipcode_visible(&self) -> bool {
        self.page.is_visible(ZIPCODE_INPUT, None).await
    }

    pub async fn input_mobile_number(&self, text: &str) -> Result<()> {
        self.page.type_text(MOBILE_NUMBER_INPUT, text, None).await
    }

    pub async fn is_mobile_number_visible(&self) -> bool {
        self.page.is_visible(MOBILE_NUMBER_INPUT, None).await
    }

    // Submit

    pub async fn click_create_account(&self) -> Result<()> {
        self.page.click(CREATE_ACCOUNT_BUTTON, None).await
    }

    pub async fn is_create_account_visible(&self) -> bool {
        self.page.is_visible(CREATE_ACCOUNT_BUTTON, None).await
    }

    pub async fn is_create_account_enabled(&self) -> bool {
        self.page.is_enabled(CREATE_ACCOUNT_BUTTON, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BoundingRect, ScriptedEngine, Tick};
    use crate::ActionConfig;

    const USER_DATA: &str = r#"{
        "title": "Mrs",
        "password": "s3cret",
        "birth_day": "15",
        "birth_month": "6",
        "birth_year": "1990",
        "newsletter": true,
        "first_name": "Ada",
        "last_name": "Lovelace",
        "address": "12 Analytical Way",
        "country": "Canada",
        "state": "Ontario",
        "city": "Toronto",
        "zipcode": "M5V 2T6",
        "mobile_number": "4165550100"
    }"#;

    #[test]
    fn test_registration_data_defaults() {
        let data = RegistrationData::from_json(USER_DATA).unwrap();
        assert_eq!(data.title, Title::Mrs);
        assert!(data.newsletter);
        assert!(!data.special_offers);
        assert_eq!(data.company, "");
        assert_eq!(data.address2, "");
    }

    #[test]
    fn test_fixture_from_row() {
        let mut row = Row::new();
        row.insert("name".into(), "Ada".into());
        row.insert("email".into(), "ada@example.com".into());
        row.insert("user_data".into(), USER_DATA.into());

        let fixture = RegistrationFixture::from_row(&row).unwrap();
        assert_eq!(fixture.email, "ada@example.com");
        assert_eq!(fixture.user_data.city, "Toronto");

        row.remove("email");
        let err = RegistrationFixture::from_row(&row).unwrap_err();
        assert!(err.to_string().contains("missing column 'email'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_registration() {
        let dir = tempfile::tempdir().unwrap();
        let rect = BoundingRect::new(300.0, 400.0, 200.0, 30.0);
        let inputs = [
            NAME_INPUT,
            PASSWORD_INPUT,
            FIRST_NAME_INPUT,
            LAST_NAME_INPUT,
            COMPANY_INPUT,
            ADDRESS_INPUT,
            ADDRESS2_INPUT,
            STATE_INPUT,
            CITY_INPUT,
            ZIPCODE_INPUT,
            MOBILE_NUMBER_INPUT,
            CREATE_ACCOUNT_BUTTON,
        ];
        let mut engine = ScriptedEngine::new()
            .visible(TITLE_MRS, rect)
            .checkbox(TITLE_MRS, false)
            .visible(NEWSLETTER_CHECKBOX, rect)
            .checkbox(NEWSLETTER_CHECKBOX, false)
            .visible(DAYS_SELECT, rect)
            .options(DAYS_SELECT, &[("14", "14"), ("15", "15")])
            .visible(MONTHS_SELECT, rect)
            .options(MONTHS_SELECT, &[("6", "June")])
            .visible(YEARS_SELECT, rect)
            .options(YEARS_SELECT, &[("1990", "1990")])
            .visible(COUNTRY_SELECT, rect)
            .options(COUNTRY_SELECT, &[("India", "India"), ("Canada", "Canada")])
            .element(SIGNUP_FORM, [Tick::Hidden]);
        for selector in inputs {
            engine = engine.visible(selector, rect);
        }

        let page = BasePage::new(
            engine,
            ActionConfig::default().with_screenshot_dir(dir.path()),
        );
        let register = RegisterPage::new(&page);
        let data = RegistrationData::from_json(USER_DATA).unwrap();

        register.complete_registration("Ada", &data).await.unwrap();

        let engine = page.engine();
        assert_eq!(
            engine.clicks(),
            vec![
                TITLE_MRS.to_string(),
                NEWSLETTER_CHECKBOX.to_string(),
                CREATE_ACCOUNT_BUTTON.to_string()
            ]
        );
        assert_eq!(
            engine.selections(),
            vec![
                (DAYS_SELECT.to_string(), "15".to_string()),
                (MONTHS_SELECT.to_string(), "6".to_string()),
                (YEARS_SELECT.to_string(), "1990".to_string()),
                (COUNTRY_SELECT.to_string(), "Canada".to_string()),
            ]
        );
        assert_eq!(engine.fills().len(), 11);
        assert!(register.is_title_mrs_checked().await);
        assert!(register.is_newsletter_checked().await);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
