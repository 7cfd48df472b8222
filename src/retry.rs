//! Retry logic with exponential backoff
//!
//! Used for transient transport failures only, never for task queue state:
//! a query that returned an error count or a still-busy queue is a valid
//! answer, not a failure to retry.
//!
//! # Example
//!
//! ```no_run
//! use archive_fixture::retry::{IsRetryable, with_retry};
//! use archive_fixture::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
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
//! with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{AwaitError, Error};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, overloaded service) return `true`.
/// Permanent failures (bad credentials, malformed responses) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            // 5xx and rate limiting; everything else means the request itself is wrong
            Error::Api { status, .. } => *status >= 500 || *status == 429,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::InvalidIdentifier(_)
            | Error::Url(_)
            | Error::Serialization(_)
            | Error::Await(_) => false,
        }
    }
}

impl IsRetryable for AwaitError {
    fn is_retryable(&self) -> bool {
        match self {
            AwaitError::Query { source, .. } => source.is_retryable(),
            AwaitError::RemoteTask { .. }
            | AwaitError::Timeout { .. }
            | AwaitError::Cancelled { .. } => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result or the last error after all retry attempts
/// are exhausted. With `max_attempts == 0` the operation runs exactly once.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    retry_loop(config, None::<(&CancellationToken, fn() -> E)>, operation).await
}

/// Like [`with_retry`], but stops with `on_cancel()` once `cancel` fires
///
/// The token is raced against every backoff sleep, so no further attempt
/// starts after cancellation. An attempt already in flight is not interrupted.
pub async fn with_retry_cancellable<F, Fut, T, E, C>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    on_cancel: C,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    C: Fn() -> E,
{
    retry_loop(config, Some((cancel, on_cancel)), operation).await
}

async fn retry_loop<F, Fut, T, E, C>(
    config: &RetryConfig,
    cancel: Option<(&CancellationToken, C)>,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    C: Fn() -> E,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                match &cancel {
                    Some((token, on_cancel)) => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => {
                                tracing::debug!(attempt, "Retry cancelled");
                                return Err(on_cancel());
                            }
                            _ = tokio::time::sleep(jittered_delay) => {}
                        }
                    }
                    None => tokio::time::sleep(jittered_delay).await,
                }

                delay = next_backoff(delay, config.backoff_multiplier, config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() && config.max_attempts > 0 {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed without retry");
                }
                return Err(e);
            }
        }
    }
}

/// Next exponential backoff step, capped at `max`
pub(crate) fn next_backoff(delay: Duration, multiplier: f64, max: Duration) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier)
        .unwrap_or(max)
        .min(max)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay lands between `delay` and `2 * delay`.
pub(crate) fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
        .unwrap_or(Duration::MAX)
}
