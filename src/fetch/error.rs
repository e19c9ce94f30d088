//! Error types for archive requests.

use thiserror::Error;

/// Failures returned by [`HttpFetcher`](super::HttpFetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure (DNS, refused connection, TLS, broken body stream).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL being fetched.
        url: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL being fetched.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Raw `Retry-After` header, if the server sent one.
        retry_after: Option<String>,
    },

    /// The URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending string.
        url: String,
    },

    /// The run was cancelled before the request was sent.
    #[error("cancelled before fetching {url}")]
    Cancelled {
        /// The URL that was not fetched.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error, promoting client timeouts to [`FetchError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error carrying a `Retry-After` value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// True when no request was sent because the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The URL this error refers to.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. }
            | Self::Timeout { url }
            | Self::HttpStatus { url, .. }
            | Self::InvalidUrl { url }
            | Self::Cancelled { url } => url,
        }
    }

    /// The HTTP status, when the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL, which the source
// error does not reliably carry.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_includes_status_and_url() {
        let error = FetchError::http_status("https://dziennikustaw.gov.pl/DU/rok/2020", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected status in: {msg}");
        assert!(msg.contains("/DU/rok/2020"), "Expected URL in: {msg}");
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn test_timeout_and_invalid_url_accessors() {
        let timeout = FetchError::timeout("https://example.com/a.pdf");
        assert!(timeout.to_string().starts_with("timeout"));
        assert_eq!(timeout.url(), "https://example.com/a.pdf");
        assert_eq!(timeout.status(), None);

        let invalid = FetchError::invalid_url("::nope");
        assert!(invalid.to_string().contains("invalid URL"));
        assert_eq!(invalid.url(), "::nope");
        assert!(!invalid.is_cancelled());
    }

    #[test]
    fn test_cancelled_names_url() {
        let error = FetchError::cancelled("https://example.com/DU/rok/1950");
        assert!(error.is_cancelled());
        assert_eq!(error.url(), "https://example.com/DU/rok/1950");
        assert!(error.to_string().contains("cancelled"));
    }
}
