//! Archive year validation and operator year selection.
//!
//! The archive publishes one volume per year from 1918 to 2024, with a gap
//! during 1940-1943 when no volumes were issued. [`Year`] can only be built
//! through validation, so every year that reaches the harvester is fetchable.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// First year published in the archive.
pub const FIRST_YEAR: u16 = 1918;

/// Last year published in the archive.
pub const LAST_YEAR: u16 = 2024;

/// Years inside the range for which the archive has no volumes.
pub const RESTRICTED_YEARS: [u16; 4] = [1940, 1941, 1942, 1943];

/// Reasons a requested year is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YearError {
    /// The value is not an integer.
    #[error("not a year")]
    NotANumber,

    /// The year is outside the published range.
    #[error("outside {FIRST_YEAR}-{LAST_YEAR}")]
    OutOfRange,

    /// The year falls in the archive gap.
    #[error("restricted (no volumes published)")]
    Restricted,
}

/// A validated archive year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Year(u16);

impl Year {
    /// Validates a numeric year against the published range and the gap.
    ///
    /// # Errors
    ///
    /// Returns [`YearError::OutOfRange`] or [`YearError::Restricted`].
    pub fn new(value: u16) -> Result<Self, YearError> {
        if !(FIRST_YEAR..=LAST_YEAR).contains(&value) {
            return Err(YearError::OutOfRange);
        }
        if RESTRICTED_YEARS.contains(&value) {
            return Err(YearError::Restricted);
        }
        Ok(Self(value))
    }

    /// Returns the numeric year.
    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }

    /// Returns every selectable year in ascending order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        (FIRST_YEAR..=LAST_YEAR)
            .filter_map(|value| Self::new(value).ok())
            .collect()
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Year {
    type Err = YearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<u16>().map_err(|_| {
            // A well-formed integer that overflows u16 is still a year request,
            // just one far out of range.
            if s.trim().parse::<i64>().is_ok() {
                YearError::OutOfRange
            } else {
                YearError::NotANumber
            }
        })?;
        Self::new(value)
    }
}

/// A year entry that was dropped from the operator's selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedYear {
    /// The raw entry as typed.
    pub input: String,
    /// Why it was dropped.
    pub reason: YearError,
}

/// The years to harvest, in the order requested, plus the rejected entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearSelection {
    /// Valid years, duplicates removed, original order kept.
    pub years: Vec<Year>,
    /// Entries that were reported and dropped.
    pub rejected: Vec<RejectedYear>,
}

impl YearSelection {
    /// Parses operator input: `all` or a comma-separated list of years.
    ///
    /// Invalid entries are collected in [`rejected`](Self::rejected) rather
    /// than failing the whole selection. Empty entries (`2020,,2021`) are
    /// ignored.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Self::all();
        }

        let mut selection = Self::default();
        for entry in trimmed.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.parse::<Year>() {
                Ok(year) => {
                    if !selection.years.contains(&year) {
                        selection.years.push(year);
                    }
                }
                Err(reason) => selection.rejected.push(RejectedYear {
                    input: entry.to_string(),
                    reason,
                }),
            }
        }
        selection
    }

    /// Selects the full valid range.
    #[must_use]
    pub fn all() -> Self {
        Self {
            years: Year::all(),
            rejected: Vec::new(),
        }
    }

    /// Returns true when no valid year was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}
