//! URL layout of the gazette archive.

use url::Url;

use crate::fetch::FetchError;
use crate::years::Year;

/// Public archive of the Polish legal gazette.
pub const DEFAULT_BASE_URL: &str = "https://dziennikustaw.gov.pl";

/// Builds archive page URLs and resolves hrefs found on them.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    base: Url,
}

impl SiteLayout {
    /// Creates a layout rooted at `base` (scheme + host, optional port).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] when `base` is not an absolute URL.
    pub fn new(base: &str) -> Result<Self, FetchError> {
        let base = Url::parse(base.trim_end_matches('/'))
            .map_err(|_| FetchError::invalid_url(base))?;
        if base.cannot_be_a_base() {
            return Err(FetchError::invalid_url(base.as_str()));
        }
        Ok(Self { base })
    }

    /// Returns the archive base URL.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Year index page: `/DU/rok/{year}`.
    #[must_use]
    pub fn year_url(&self, year: Year) -> String {
        format!("{}/DU/rok/{year}", self.origin())
    }

    /// Issue page: `/DU/rok/{year}/wydanie/{journal}`.
    #[must_use]
    pub fn issue_url(&self, year: Year, journal: &str) -> String {
        format!("{}/DU/rok/{year}/wydanie/{journal}", self.origin())
    }

    /// Resolves an href from an archive page into an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] when the href cannot be joined.
    pub fn resolve(&self, href: &str) -> Result<String, FetchError> {
        self.base
            .join(href.trim())
            .map(String::from)
            .map_err(|_| FetchError::invalid_url(href))
    }

    fn origin(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }
}

impl Default for SiteLayout {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_BASE_URL).expect("default base URL is a valid absolute URL"),
        }
    }
}
