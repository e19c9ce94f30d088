//! Bounded retry with exponential backoff for transient fetch failures.
//!
//! Only transport failures, timeouts and retryable HTTP statuses (408, 429,
//! 5xx) are retried. Everything else, including local write failures and
//! page parsing, fails on the first attempt. A `Retry-After` header on a 429
//! is honoured by pushing the host's pacing schedule back instead of using
//! the computed backoff.
//!
//! Cancellation interrupts the pacing wait and the backoff sleep. A request
//! that has already been sent is never interrupted.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{FetchError, HttpFetcher};
use crate::pacing::{RateLimiter, parse_retry_after};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of a failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on another attempt (timeouts, resets, 5xx).
    Transient,
    /// Will not succeed on retry (4xx, invalid URL, local I/O).
    Permanent,
    /// The server asked us to slow down (429).
    RateLimited,
}

/// Decision for a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`; `attempt` is the upcoming attempt number.
    Retry {
        /// Backoff before the next attempt.
        delay: Duration,
        /// 1-indexed number of the next attempt.
        attempt: u32,
    },
    /// Give up.
    DoNotRetry {
        /// Why no further attempt is made.
        reason: String,
    },
}

/// Errors that can be classified for retry.
pub trait Retryable {
    /// How the failure should be treated.
    fn failure_type(&self) -> FailureType;

    /// Raw `Retry-After` value carried by the failure, if any.
    fn retry_after(&self) -> Option<&str> {
        None
    }
}

impl Retryable for FetchError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::HttpStatus { status, .. } => classify_status(*status),
            Self::Timeout { .. } | Self::Network { .. } => FailureType::Transient,
            Self::InvalidUrl { .. } | Self::Cancelled { .. } => FailureType::Permanent,
        }
    }

    fn retry_after(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

/// Classifies an HTTP status code.
#[must_use]
pub fn classify_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Exponential backoff configuration.
///
/// `delay = min(base * multiplier^(attempt-1), max) + jitter(0..=500ms)`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit settings. `max_attempts` is at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy allowing `retries` attempts after the first one.
    #[must_use]
    pub fn with_max_retries(retries: u32) -> Self {
        Self::new(
            retries.saturating_add(1),
            DEFAULT_BASE_DELAY,
            DEFAULT_MAX_DELAY,
            DEFAULT_BACKOFF_MULTIPLIER,
        )
    }

    /// A single attempt, never retrying.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_max_retries(0)
    }

    /// Total attempts including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after attempt number `attempt` (1-indexed) failed.
    #[must_use]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure".to_string(),
            };
        }
        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }
        RetryDecision::Retry {
            delay: self.calculate_delay(attempt),
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_ms = self.base_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay.as_millis() as f64);
        let jitter_ms = rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64);
        Duration::from_millis(delay_ms as u64) + Duration::from_millis(jitter_ms)
    }
}

/// Runs `op` with pacing before every attempt and retries per `policy`.
///
/// No attempt starts once `cancel` fires; waiting for pacing or backoff then
/// ends with [`FetchError::Cancelled`].
///
/// # Errors
///
/// Returns the last error once the policy gives up, or a cancellation error.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    pacer: &RateLimiter,
    cancel: &CancellationToken,
    url: &str,
    mut op: F,
) -> Result<T, E>
where
    E: Retryable + Display + From<FetchError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(url, attempt, "cancelled before request");
                return Err(FetchError::cancelled(url).into());
            }
            () = pacer.acquire(url) => {}
        }

        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let failure_type = error.failure_type();
        let server_delay = (failure_type == FailureType::RateLimited)
            .then(|| error.retry_after().and_then(parse_retry_after))
            .flatten();

        match policy.should_retry(failure_type, attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                info!(
                    url,
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = server_delay.unwrap_or(delay).as_millis(),
                    error = %error,
                    "retrying request"
                );
                if let Some(server_delay) = server_delay {
                    // The next acquire() waits out the server's delay.
                    pacer.record_server_delay(url, server_delay).await;
                } else {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(error),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(url, %reason, attempts = attempt, "not retrying");
                return Err(error);
            }
        }
    }
}

/// Fetches a page body with pacing and retry.
///
/// # Errors
///
/// Returns the final [`FetchError`] once retries are exhausted, or
/// [`FetchError::Cancelled`] when `cancel` fired before a request went out.
pub async fn fetch_with_retry(
    fetcher: &HttpFetcher,
    policy: &RetryPolicy,
    pacer: &RateLimiter,
    cancel: &CancellationToken,
    url: &str,
) -> Result<Bytes, FetchError> {
    run_with_retry(policy, pacer, cancel, url, || fetcher.fetch(url)).await
}
