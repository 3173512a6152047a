//! Page objects for the storefront
//!
//! Each page borrows a [`BasePage`](crate::BasePage) and exposes
//! intent-level methods (`login`, `complete_registration`, ...). Each page's
//! selectors are written once, in its [`SelectorCatalog`]; the `&'static str`
//! constants the page methods use are looked up from it at compile time.

pub mod account_created;
pub mod home;
pub mod login;
pub mod register;

pub use account_created::AccountCreatedPage;
pub use home::HomePage;
pub use login::{Credentials, LoginPage, SignupData};
pub use register::{RegisterPage, RegistrationData, RegistrationFixture};

use crate::error::{Error, Result};

/// Named selectors of one page, fixed at compile time
#[derive(Debug, Clone, Copy)]
pub struct SelectorCatalog {
    page: &'static str,
    entries: &'static [(&'static str, &'static str)],
}

impl SelectorCatalog {
    pub const fn new(page: &'static str, entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { page, entries }
    }

    /// Name of the page this catalog belongs to
    pub fn page(&self) -> &'static str {
        self.page
    }

    /// Compile-time lookup for deriving selector constants
    ///
    /// Panics when `name` is not in the catalog, which fails the build when
    /// evaluated in a `const`.
    pub const fn require(&self, name: &str) -> &'static str {
        let mut i = 0;
        while i < self.entries.len() {
            if bytes_eq(self.entries[i].0.as_bytes(), name.as_bytes()) {
                return self.entries[i].1;
            }
            i += 1;
        }
        panic!("selector name is not in the catalog")
    }

    pub fn get(&self, name: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, selector)| *selector)
    }

    /// Look up a selector by name, failing with [`Error::UnknownSelector`]
    pub fn selector(&self, name: &str) -> Result<&'static str> {
        self.get(name).ok_or_else(|| Error::UnknownSelector {
            page: self.page.to_string(),
            name: name.to_string(),
        })
    }

    /// `(name, selector)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const fn bytes_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Every page catalog, for whole-suite checks
pub const ALL_CATALOGS: &[SelectorCatalog] = &[
    home::CATALOG,
    login::CATALOG,
    register::CATALOG,
    account_created::CATALOG,
];
