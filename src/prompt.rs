//! Interactive prompts used when `--years` is omitted on a terminal.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::warn;

use harvester_core::{FIRST_YEAR, LAST_YEAR, RESTRICTED_YEARS, YearSelection};

/// Asks for the years to harvest.
pub fn prompt_years(input: &mut impl BufRead, output: &mut impl Write) -> Result<YearSelection> {
    let restricted = RESTRICTED_YEARS
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    write!(
        output,
        "Years to download ({FIRST_YEAR}-{LAST_YEAR}, excluding {restricted}), \
         comma-separated or 'all': "
    )?;
    output.flush()?;

    let line = read_line(input)?;
    Ok(YearSelection::parse(&line))
}

/// Asks for the document limit. Anything that is not a number means
/// unlimited.
pub fn prompt_limit(input: &mut impl BufRead, output: &mut impl Write) -> Result<u64> {
    write!(output, "Maximum number of documents (0 = unlimited): ")?;
    output.flush()?;

    let line = read_line(input)?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    Ok(trimmed.parse().unwrap_or_else(|_| {
        warn!(input = trimmed, "invalid limit; downloading without a limit");
        0
    }))
}

fn read_line(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read operator input")?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_prompt_years_parses_list() {
        let mut out = Vec::new();
        let selection = prompt_years(&mut Cursor::new("1950, 1941,2020\n"), &mut out).unwrap();
        assert_eq!(selection.years.len(), 2);
        assert_eq!(selection.rejected.len(), 1);
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("1918-2024"));
        assert!(shown.contains("1940, 1941, 1942, 1943"));
    }

    #[test]
    fn test_prompt_years_accepts_all() {
        let selection = prompt_years(&mut Cursor::new("ALL\n"), &mut Vec::new()).unwrap();
        assert_eq!(selection, YearSelection::all());
    }

    #[test]
    fn test_prompt_limit_invalid_means_unlimited() {
        assert_eq!(prompt_limit(&mut Cursor::new("12\n"), &mut Vec::new()).unwrap(), 12);
        assert_eq!(prompt_limit(&mut Cursor::new("abc\n"), &mut Vec::new()).unwrap(), 0);
        assert_eq!(prompt_limit(&mut Cursor::new("-3\n"), &mut Vec::new()).unwrap(), 0);
        assert_eq!(prompt_limit(&mut Cursor::new(""), &mut Vec::new()).unwrap(), 0);
    }
}
