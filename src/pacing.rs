//! Politeness pacing between requests to the archive.
//!
//! The archive is a public government server, so the harvester never sends
//! requests to one host faster than a fixed interval. [`RateLimiter`] is
//! owned by the run coordinator and shared (`Arc`) by the page walker and
//! every download worker, which keeps the rate bounded when downloads run
//! concurrently. Server-mandated waits from `Retry-After` are folded into
//! the same per-host schedule.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Default interval between consecutive requests to the same host.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Maximum Retry-After value honoured (1 hour).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Per-host interval pacing.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    disabled: bool,
    hosts: DashMap<String, Arc<HostSchedule>>,
}

#[derive(Debug, Default)]
struct HostSchedule {
    /// Earliest instant the next request may be sent. `None` until the first
    /// request to the host.
    next_allowed: Mutex<Option<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl RateLimiter {
    /// Creates a pacer enforcing `interval` between requests to one host.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            disabled: interval.is_zero(),
            hosts: DashMap::new(),
        }
    }

    /// Creates a pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a request to `url`'s host is allowed, then books the slot.
    #[instrument(level = "trace", skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }
        let host = extract_host(url);
        tracing::Span::current().record("host", host.as_str());

        // Clone the Arc so the DashMap shard lock is released before awaiting.
        let schedule = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostSchedule::default()))
            .clone();

        let mut next_allowed = schedule.next_allowed.lock().await;
        if let Some(at) = *next_allowed {
            let now = Instant::now();
            if at > now {
                let wait = at - now;
                debug!(host = %host, wait_ms = wait.as_millis(), "pacing request");
                tokio::time::sleep_until(at).await;
            }
        }
        *next_allowed = Some(Instant::now() + self.interval);
    }

    /// Pushes the host's next allowed request out by a server-mandated delay.
    pub async fn record_server_delay(&self, url: &str, delay: Duration) {
        let host = extract_host(url);
        let schedule = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostSchedule::default()))
            .clone();
        let mut next_allowed = schedule.next_allowed.lock().await;
        let candidate = Instant::now() + delay;
        if next_allowed.is_none_or(|at| at < candidate) {
            *next_allowed = Some(candidate);
        }
        if delay >= Duration::from_secs(30) {
            warn!(host = %host, delay_secs = delay.as_secs(), "server requested a long back-off");
        }
    }
}

/// Extracts the lowercase host from a URL, `unknown` when it has none.
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a `Retry-After` header value (seconds or HTTP-date), capped at one hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let value = header_value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }
    let at = httpdate::parse_http_date(value).ok()?;
    let delay = at
        .duration_since(std::time::SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Some(delay.min(MAX_RETRY_AFTER))
}
