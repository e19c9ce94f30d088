//! CLI entry point for the gazette harvester.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use harvester_core::{RunCoordinator, YearSelection};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod exit;
mod output;
mod prompt;

use cli::Args;
use config::Settings;
use exit::{ProcessExit, determine_exit_outcome};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(outcome) => outcome.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(args.default_log_level());
    debug!(?args, "CLI arguments parsed");

    if args.list_years {
        output::write_year_list(&mut io::stdout().lock())?;
        return Ok(ProcessExit::Success);
    }

    let loaded = config::load_config(args.config.as_deref())?;
    if let Some(path) = loaded.path.as_deref()
        && loaded.config.is_some()
    {
        info!(path = %path.display(), "loaded config file");
    }
    let mut settings = Settings::resolve(&args, loaded.config.as_ref());

    let selection = match args.years.as_deref() {
        Some(years) => YearSelection::parse(years),
        None if io::stdin().is_terminal() => {
            let mut stdin = io::stdin().lock();
            let mut stdout = io::stdout();
            let selection = prompt::prompt_years(&mut stdin, &mut stdout)?;
            if !Settings::limit_is_configured(&args, loaded.config.as_ref()) {
                settings.limit = prompt::prompt_limit(&mut stdin, &mut stdout)?;
            }
            selection
        }
        None => bail!("No years given. Pass --years all or a list such as --years 1950,1951."),
    };

    for rejected in &selection.rejected {
        warn!(input = %rejected.input, reason = %rejected.reason, "skipping invalid year");
    }
    if selection.is_empty() {
        println!("{}", output::NO_YEARS_GUIDANCE);
        return Ok(ProcessExit::Failure);
    }

    let options = settings.into_options()?;
    info!(
        years = selection.years.len(),
        limit = options.limit,
        scope = options.quota_scope.as_str(),
        workers = options.workers,
        output_dir = %options.output_dir.display(),
        "gazette harvester starting"
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());
    if let Some(secs) = args.timeout {
        spawn_deadline(cancel.clone(), Duration::from_secs(secs));
    }

    let result = RunCoordinator::new(options, cancel)
        .run(&selection)
        .await
        .context("Harvest could not start")?;

    let mut stdout = io::stdout().lock();
    if args.json {
        output::write_json(&result, &mut stdout)?;
    } else {
        output::write_summary(&result, output::terminal_width(), &mut stdout)?;
    }

    Ok(determine_exit_outcome(&result))
}

fn init_tracing(default_level: &str) {
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing running downloads");
            cancel.cancel();
        }
    });
}

fn spawn_deadline(cancel: CancellationToken, after: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(after) => {
                warn!(timeout_secs = after.as_secs(), "timeout reached; finishing running downloads");
                cancel.cancel();
            }
            () = cancel.cancelled() => {}
        }
    });
}
