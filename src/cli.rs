//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use harvester_core::QuotaScope;

/// Mirror the Dziennik Ustaw legal gazette archive as local PDF files.
///
/// Walks year, issue and position pages of the archive and stores every
/// document under `{output-dir}/{year}/` with a deterministic file name.
/// Re-running the same selection skips documents already on disk.
#[derive(Parser, Debug)]
#[command(name = "gazette-harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Years to harvest: `all` or a comma-separated list (e.g. 1950,1951).
    /// Prompted interactively when omitted on a terminal.
    #[arg(short = 'y', long)]
    pub years: Option<String>,

    /// Maximum number of documents to download (0 = unlimited)
    #[arg(short = 'n', long)]
    pub limit: Option<u64>,

    /// Whether --limit counts across the whole run or restarts every year
    #[arg(long, value_enum)]
    pub quota_scope: Option<QuotaScopeArg>,

    /// Concurrent document downloads (1-16); pages are always walked sequentially
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub workers: Option<u8>,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Minimum delay between requests in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Root directory of the local archive [default: ./dziennik_ustaw]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Archive base URL [default: https://dziennikustaw.gov.pl]
    #[arg(long)]
    pub base_url: Option<String>,

    /// Config file (defaults to $XDG_CONFIG_HOME/gazette-harvester/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop starting new work after this many seconds; running downloads finish
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Print the run result as JSON instead of the text summary
    #[arg(long)]
    pub json: bool,

    /// Print the selectable years and exit
    #[arg(long)]
    pub list_years: bool,
}

impl Args {
    /// Default log level from the verbosity flags.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

/// CLI spelling of [`QuotaScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuotaScopeArg {
    /// One budget for the whole run
    Run,
    /// A fresh budget per year
    Year,
}

impl From<QuotaScopeArg> for QuotaScope {
    fn from(value: QuotaScopeArg) -> Self {
        match value {
            QuotaScopeArg::Run => Self::Run,
            QuotaScopeArg::Year => Self::Year,
        }
    }
}
