//! Retry logic with exponential backoff
//!
//! Photo fetches against a rate-limited source fail transiently all the time.
//! This module retries them with exponential backoff and optional jitter, honours
//! server-provided `Retry-After` hints, and stops waiting as soon as the owning
//! job is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use flickr_dl::retry::{IsRetryable, download_with_retry};
//! use flickr_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! download_with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, throttling, 5xx responses) should return `true`.
/// Permanent failures (photo gone, bad credentials, malformed data) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Minimum wait requested by the server before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::SourceUnavailable(_) => true,
            // Per-item failures have already been through their own retries
            Error::ItemFetchFailed { .. } => false,
            Error::TooManyJobs { .. } => false,
            Error::InvalidRequest(_)
            | Error::JobFailed(_)
            | Error::Cancelled
            | Error::JobNotFound(_)
            | Error::NotReady { .. }
            | Error::ResultExpired(_)
            | Error::ShuttingDown
            | Error::Config { .. }
            | Error::Serialization(_)
            | Error::Archive(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result or the last error after all retry attempts are exhausted.
pub async fn download_with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    retry_until_cancelled(config, &CancellationToken::new(), operation).await
}

/// Like [`download_with_retry`], but gives up waiting once `cancel` fires
///
/// An attempt already in flight is allowed to finish. Cancellation only cuts the
/// backoff sleep short, in which case the last error is returned.
pub async fn retry_until_cancelled<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                let wait = next_wait(config, delay, e.retry_after());

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis() as u64,
                    "operation failed, retrying"
                );

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(error = %e, "retry abandoned, cancelled while waiting");
                        return Err(e);
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                delay = next_delay(config, delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        error = %e,
                        attempts = attempt + 1,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Wait before the next attempt: the backoff delay (jittered if enabled), raised to
/// the server's `Retry-After` hint. A hint never pushes the wait past `max_delay`.
fn next_wait(config: &RetryConfig, delay: Duration, retry_after: Option<Duration>) -> Duration {
    let backoff = if config.jitter {
        add_jitter(delay)
    } else {
        delay
    };

    match retry_after {
        Some(hint) => backoff.max(hint).min(config.max_delay),
        None => backoff,
    }
}

/// Grow the backoff delay, saturating at `max_delay`
fn next_delay(config: &RetryConfig, delay: Duration) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
