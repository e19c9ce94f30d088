//! Exit code logic for the harvester process.

use std::process::ExitCode;

use harvester_core::RunResult;

/// Process outcome mapped to an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Everything requested was harvested (or already present).
    Success,
    /// A year produced nothing although it should have, the run was
    /// cancelled, or the run could not start.
    Failure,
    /// Some documents or pages failed but every year made progress.
    Partial,
}

impl ProcessExit {
    /// Numeric exit status.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(value: ProcessExit) -> Self {
        ExitCode::from(value.code())
    }
}

/// Maps a run result to the process outcome.
pub fn determine_exit_outcome(result: &RunResult) -> ProcessExit {
    if result.cancelled || result.failed_years().next().is_some() {
        ProcessExit::Failure
    } else if result.years.iter().any(|year| year.is_partial()) {
        ProcessExit::Partial
    } else {
        ProcessExit::Success
    }
}

#[cfg(test)]
mod tests {
    use harvester_core::{FailureLevel, Year, YearReport, YearStatus};

    use super::*;

    fn report(year: u16) -> YearReport {
        YearReport::new(Year::new(year).unwrap())
    }

    fn result(years: Vec<YearReport>) -> RunResult {
        RunResult {
            years,
            ..RunResult::default()
        }
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        let mut year = report(1950);
        year.attempted = 3;
        year.downloaded = 3;
        assert_eq!(determine_exit_outcome(&result(vec![year])), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_success_when_everything_skipped() {
        let mut year = report(1950);
        year.skipped_existing = 4;
        assert_eq!(determine_exit_outcome(&result(vec![year])), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_some_documents_failed() {
        let mut year = report(1950);
        year.attempted = 3;
        year.downloaded = 2;
        year.failed = 1;
        year.record_failure(FailureLevel::Document, "https://x/a.pdf", "HTTP 404".into());
        assert_eq!(determine_exit_outcome(&result(vec![year])), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_year_page_failed() {
        let mut failed = report(1939);
        failed.status = YearStatus::YearPageFailed;
        let mut ok = report(1950);
        ok.attempted = 1;
        ok.downloaded = 1;
        assert_eq!(
            determine_exit_outcome(&result(vec![failed, ok])),
            ProcessExit::Failure
        );
    }

    #[test]
    fn test_exit_outcome_failure_when_every_issue_page_failed() {
        let mut nested = report(1950);
        for journal in 1..=3 {
            nested.record_failure(
                FailureLevel::Issue,
                format!("https://x/DU/rok/1950/wydanie/{journal}"),
                "HTTP 503".into(),
            );
        }
        let mut ok = report(2020);
        ok.attempted = 1;
        ok.downloaded = 1;
        assert_eq!(
            determine_exit_outcome(&result(vec![nested, ok])),
            ProcessExit::Failure
        );
    }

    #[test]
    fn test_exit_outcome_failure_when_cancelled() {
        let cancelled = RunResult {
            cancelled: true,
            ..RunResult::default()
        };
        assert_eq!(determine_exit_outcome(&cancelled), ProcessExit::Failure);
        assert_eq!(ProcessExit::Partial.code(), 2);
    }
}
