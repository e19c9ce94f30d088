//! Configuration file loading and CLI/file/default merging.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use harvester_core::fetch::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use harvester_core::{
    DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_OUTPUT_DIR, DEFAULT_WORKERS, HarvestOptions,
    HttpFetcher, MAX_WORKERS, QuotaScope, RateLimiter, RetryPolicy, SiteLayout,
};

use crate::cli::Args;

/// Default pacing interval in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// TOML-backed defaults. Every key is optional; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Root of the local archive.
    pub output_dir: Option<PathBuf>,
    /// Archive base URL.
    pub base_url: Option<String>,
    /// Document limit (0 = unlimited).
    pub limit: Option<u64>,
    /// `run` or `year`.
    pub quota_scope: Option<QuotaScope>,
    /// Concurrent download workers.
    pub workers: Option<usize>,
    /// Pacing interval in milliseconds.
    pub rate_limit: Option<u64>,
    /// Retries after the first attempt.
    pub max_retries: Option<u32>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers
            && !(1..=MAX_WORKERS).contains(&workers)
        {
            bail!("Invalid config value for `workers`: {workers}. Expected range: 1..={MAX_WORKERS}");
        }
        if let Some(rate_limit) = self.rate_limit
            && rate_limit > 60_000
        {
            bail!("Invalid config value for `rate_limit`: {rate_limit}. Expected range: 0..=60000");
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(base_url) = &self.base_url {
            SiteLayout::new(base_url)
                .with_context(|| format!("Invalid config value for `base_url`: {base_url}"))?;
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path the config was (or would have been) read from.
    pub path: Option<PathBuf>,
    /// Parsed config when a file was found.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/gazette-harvester/config.toml`
/// 2. `$HOME/.config/gazette-harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("gazette-harvester")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("gazette-harvester")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` (which must exist) or the default config if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.is_file() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Effective settings after applying CLI > file > built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub base_url: String,
    pub limit: u64,
    pub quota_scope: QuotaScope,
    pub workers: usize,
    pub rate_limit_ms: u64,
    pub max_retries: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Settings {
    /// Merges CLI flags over file values over defaults.
    #[must_use]
    pub fn resolve(args: &Args, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        Self {
            output_dir: args
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            base_url: args
                .base_url
                .clone()
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            limit: args.limit.or(file.limit).unwrap_or(0),
            quota_scope: args
                .quota_scope
                .map(QuotaScope::from)
                .or(file.quota_scope)
                .unwrap_or_default(),
            workers: args
                .workers
                .map(usize::from)
                .or(file.workers)
                .unwrap_or(DEFAULT_WORKERS),
            rate_limit_ms: args
                .rate_limit
                .or(file.rate_limit)
                .unwrap_or(DEFAULT_RATE_LIMIT_MS),
            max_retries: args
                .max_retries
                .map(u32::from)
                .or(file.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            connect_timeout_secs: file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
        }
    }

    /// True when the limit is known without prompting.
    #[must_use]
    pub fn limit_is_configured(args: &Args, file: Option<&FileConfig>) -> bool {
        args.limit.is_some() || file.is_some_and(|f| f.limit.is_some())
    }

    /// Builds library options.
    pub fn into_options(self) -> Result<HarvestOptions> {
        let site = SiteLayout::new(&self.base_url)
            .with_context(|| format!("Invalid base URL '{}'", self.base_url))?;
        let rate_limiter = if self.rate_limit_ms == 0 {
            RateLimiter::disabled()
        } else {
            RateLimiter::new(Duration::from_millis(self.rate_limit_ms))
        };
        Ok(HarvestOptions {
            output_dir: self.output_dir,
            site,
            limit: self.limit,
            quota_scope: self.quota_scope,
            workers: self.workers,
            retry_policy: RetryPolicy::with_max_retries(self.max_retries),
            rate_limiter: Arc::new(rate_limiter),
            fetcher: HttpFetcher::new_with_timeouts(
                self.connect_timeout_secs,
                self.read_timeout_secs,
            ),
        })
    }
}
