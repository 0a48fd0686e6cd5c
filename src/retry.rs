//! Opt-in retry with exponential backoff
//!
//! Nothing in the crate retries on its own. When [`Config::retry`](crate::config::Config::retry)
//! is set, the retrieval engine wraps each search probe in [`with_retry`] so that a
//! dropped connection or a timeout does not abort a long period download. Credential
//! errors, parse errors and HTTP status errors are never retried.
//!
//! # Example
//!
//! ```no_run
//! use cfdi_dl::config::RetryConfig;
//! use cfdi_dl::error::Error;
//! use cfdi_dl::retry::with_retry;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let body = with_retry(&config, || async {
//!     Ok::<String, Error>("<html></html>".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies errors as transient (worth another attempt) or permanent
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            // Status errors are reported as "HTTP <code>" and are not transient
            Error::SessionTransport { message, .. } => {
                let message = message.to_ascii_lowercase();
                message.contains("timeout")
                    || message.contains("connection")
                    || message.contains("reset")
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::DayFailed { source, .. } => source.is_retryable(),
            Error::Config { .. }
            | Error::InvalidCredentials
            | Error::NotAuthenticated
            | Error::InvalidDateRange { .. }
            | Error::InvalidWindow { .. }
            | Error::InvalidClock { .. }
            | Error::FetchItem { .. }
            | Error::Parse(_)
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// The first call is not counted as a retry, so the operation runs at most
/// `max_attempts + 1` times. Delays grow by `backoff_multiplier` up to `max_delay`.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut retries = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(attempts = retries + 1, "probe succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && retries < config.max_attempts => {
                retries += 1;
                let wait = if config.jitter { add_jitter(delay) } else { delay };

                tracing::warn!(
                    error = %e,
                    retry = retries,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis(),
                    "transient failure, retrying"
                );
                tokio::time::sleep(wait).await;

                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts = retries + 1, "giving up after retries");
                }
                return Err(e);
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, saturating at `max_delay`
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
}
