//! Runtime configuration for the application.
//!
//! The server binary builds an [AppConfig] from its command line arguments and
//! environment, validates it, and hands it to [crate::AppState::new].

use crate::{Error, timezone::get_local_offset};

/// The default number of transactions shown per page.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// The default number of page links shown in the pagination controls.
pub const DEFAULT_MAX_PAGINATION_LINKS: u64 = 5;

/// Settings that are fixed for the lifetime of the server process.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// The number of transactions to show on each page of the transactions list.
    pub page_size: u64,
    /// The maximum number of page links to show in the pagination controls.
    pub max_pagination_links: u64,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The secret used to derive the key for encrypting cookies.
    pub cookie_secret: String,
}

impl AppConfig {
    /// Create a config with the default pagination settings.
    pub fn new(cookie_secret: &str, local_timezone: &str) -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pagination_links: DEFAULT_MAX_PAGINATION_LINKS,
            local_timezone: local_timezone.to_owned(),
            cookie_secret: cookie_secret.to_owned(),
        }
    }

    /// Set the page size.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Check that the config can be used to run the server.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidConfig] if the page size or number of
    /// pagination links is zero or if the cookie secret is empty, and an
    /// [Error::InvalidTimezoneError] if the timezone is not a canonical timezone name.
    pub fn validate(&self) -> Result<(), Error> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig(
                "page size must be greater than zero".to_owned(),
            ));
        }

        if self.max_pagination_links == 0 {
            return Err(Error::InvalidConfig(
                "the number of pagination links must be greater than zero".to_owned(),
            ));
        }

        if self.cookie_secret.is_empty() {
            return Err(Error::InvalidConfig(
                "the cookie secret must not be empty".to_owned(),
            ));
        }

        if get_local_offset(&self.local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(self.local_timezone.clone()));
        }

        Ok(())
    }
}
