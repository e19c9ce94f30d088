//! Network access to the archive.
//!
//! [`HttpFetcher`] is the only component that talks to the network. It
//! returns page bodies or streaming responses, and reports non-2xx statuses
//! as typed [`FetchError`]s rather than failing loudly. Retries are layered
//! on top through [`fetch_with_retry`], which only ever retries transport
//! failures and retryable HTTP statuses.

mod client;
mod constants;
mod error;
mod retry;

pub use client::HttpFetcher;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::FetchError;
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, Retryable, RetryDecision, RetryPolicy, classify_status,
    fetch_with_retry, run_with_retry,
};
