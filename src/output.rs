//! Run summary rendering for stdout.

use std::io::Write;

use anyhow::Result;

use harvester_core::harvest::RunTotals;
use harvester_core::{FailureLevel, RunResult, Year, YearReport, YearStatus};

/// Shown when no valid year remains after parsing the selection.
pub const NO_YEARS_GUIDANCE: &str =
    "No valid years selected. Pass --years all or a list such as --years 1950,1951.";

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

/// Prints every selectable year, ten per line.
pub fn write_year_list(out: &mut impl Write) -> Result<()> {
    let years: Vec<String> = Year::all().iter().map(ToString::to_string).collect();
    for row in years.chunks(10) {
        writeln!(out, "{}", row.join(" "))?;
    }
    Ok(())
}

/// Writes the run result as pretty JSON.
pub fn write_json(result: &RunResult, out: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, result)?;
    writeln!(out)?;
    Ok(())
}

/// Writes the human-readable summary.
pub fn write_summary(result: &RunResult, width: usize, out: &mut impl Write) -> Result<()> {
    for rejected in &result.rejected {
        writeln!(out, "Skipped year '{}': {}", rejected.input, rejected.reason)?;
    }

    for year in &result.years {
        writeln!(out, "{}", year_line(year))?;
    }

    writeln!(out, "{}", totals_line(&result.totals()))?;
    if result.cancelled {
        writeln!(out, "Run cancelled; re-run the same selection to resume.")?;
    }

    let failures: Vec<_> = result
        .years
        .iter()
        .flat_map(|y| y.failures.iter().map(move |f| (y.year, f)))
        .collect();
    if !failures.is_empty() {
        writeln!(out, "Failures ({}):", failures.len())?;
        for (year, failure) in failures {
            let line = format!(
                "  {year} [{}] {} - {}",
                level_label(failure.level),
                failure.url,
                failure.cause
            );
            writeln!(out, "{}", truncate_to_width(&line, width))?;
        }
    }
    Ok(())
}

fn year_line(year: &YearReport) -> String {
    format!(
        "{}  {:<16} attempted {:>4}  downloaded {:>4}  skipped {:>4}  failed {:>4}",
        year.year,
        status_label(year.status),
        year.attempted,
        year.downloaded,
        year.skipped_existing,
        year.failed
    )
}

fn totals_line(totals: &RunTotals) -> String {
    format!(
        "Total: {} year(s), {} downloaded, {} skipped, {} failed, {} bytes",
        totals.years, totals.downloaded, totals.skipped_existing, totals.failed, totals.bytes
    )
}

fn status_label(status: YearStatus) -> &'static str {
    match status {
        YearStatus::Completed => "completed",
        YearStatus::StoppedByQuota => "limit reached",
        YearStatus::YearPageFailed => "year page failed",
        YearStatus::Cancelled => "cancelled",
    }
}

fn level_label(level: FailureLevel) -> &'static str {
    match level {
        FailureLevel::Year => "year",
        FailureLevel::Issue => "issue",
        FailureLevel::Position => "position",
        FailureLevel::Document => "document",
    }
}
