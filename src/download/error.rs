//! Error types for document downloads.

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::{FailureType, FetchError, Retryable};

/// Why a single document could not be stored.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request failed (transport, timeout, non-2xx).
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Writing or renaming the file failed.
    #[error("write error at {path}: {source}")]
    Write {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// True when the download never started because the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(error) if error.is_cancelled())
    }
}

impl Retryable for DownloadError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::Fetch(error) => error.failure_type(),
            Self::Write { .. } => FailureType::Permanent,
        }
    }

    fn retry_after(&self) -> Option<&str> {
        match self {
            Self::Fetch(error) => error.retry_after(),
            Self::Write { .. } => None,
        }
    }
}
