//! Deterministic destination names for discovered documents.
//!
//! The same discovery key always maps to the same file name. That is what
//! makes a harvest resumable: a second run recomputes the names, finds the
//! files already on disk and skips them.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::years::Year;

/// Server-side document names on flat years already follow the archive
/// scheme (`D` + digits + `.pdf`).
#[allow(clippy::expect_used)]
static SERVER_DOCUMENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^D[0-9]+\.pdf$").expect("static regex is valid"));

/// Where in the archive hierarchy a document was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum DocumentKey {
    /// Listed directly on a flat year page.
    Flat {
        /// Archive year.
        year: Year,
        /// 1-based index among the year page's PDF links.
        ordinal: u32,
        /// Server file name when it already matches the archive scheme.
        server_name: Option<String>,
    },
    /// Found on a position page below an issue.
    Nested {
        /// Archive year.
        year: Year,
        /// Journal (issue) number, digits only.
        journal: String,
        /// Position number, digits only.
        position: String,
        /// 1-based index among the position's PDF links.
        ordinal: u32,
    },
}

impl DocumentKey {
    /// Key for a link on a flat year page.
    #[must_use]
    pub fn flat(year: Year, ordinal: u32, url: &str) -> Self {
        let server_name = url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| SERVER_DOCUMENT_NAME.is_match(name))
            .map(normalize_extension);
        Self::Flat {
            year,
            ordinal,
            server_name,
        }
    }

    /// Key for a link on a position page.
    #[must_use]
    pub fn nested(year: Year, journal: &str, position: &str, ordinal: u32) -> Self {
        Self::Nested {
            year,
            journal: journal.to_string(),
            position: position.to_string(),
            ordinal,
        }
    }

    /// The archive year.
    #[must_use]
    pub fn year(&self) -> Year {
        match self {
            Self::Flat { year, .. } | Self::Nested { year, .. } => *year,
        }
    }

    /// Destination file name.
    ///
    /// Nested: `D{year}{journal:0>2}{position}{ordinal:02}.pdf`.
    /// Flat: the server name when recognised, else `D{year}{ordinal:02}.pdf`.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Nested {
                year,
                journal,
                position,
                ordinal,
            } => format!("D{year}{journal:0>2}{position}{ordinal:02}.pdf"),
            Self::Flat {
                server_name: Some(name),
                ..
            } => name.clone(),
            Self::Flat { year, ordinal, .. } => format!("D{year}{ordinal:02}.pdf"),
        }
    }
}

/// A PDF URL plus the key it was discovered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentLink {
    /// Absolute document URL.
    pub url: String,
    /// Discovery key.
    pub key: DocumentKey,
}

impl DocumentLink {
    /// Creates a link.
    #[must_use]
    pub fn new(url: impl Into<String>, key: DocumentKey) -> Self {
        Self {
            url: url.into(),
            key,
        }
    }

    /// Destination path: `{root}/{year}/{file_name}`.
    #[must_use]
    pub fn destination(&self, root: &Path) -> PathBuf {
        year_dir(root, self.key.year()).join(self.key.file_name())
    }
}

/// Per-year output directory.
#[must_use]
pub fn year_dir(root: &Path, year: Year) -> PathBuf {
    root.join(year.to_string())
}

fn normalize_extension(name: &str) -> String {
    let stem = &name[..name.len() - 4];
    format!("{stem}.pdf")
}
