//! Bounded retry with a fixed delay
//!
//! An explicit loop rather than recursion: the attempt count is part of the
//! outcome and the call stack does not grow with retries.

use crate::error::{PlaybackError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    /// The operation succeeded on attempt `attempts`
    Succeeded { value: T, attempts: u32 },

    /// Every allowed attempt failed; `error` is the last failure
    Exhausted { error: PlaybackError, attempts: u32 },

    /// The operation failed with a non-retryable error
    Aborted { error: PlaybackError, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { error, .. } | Self::Aborted { error, .. } => Err(error),
        }
    }
}

/// Fixed-delay retry policy
///
/// A failing operation runs `max_retries + 1` times in total. No exponential
/// growth, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `operation` until it succeeds or the retries run out
    ///
    /// `operation` receives the retry count of the attempt (0 for the first).
    /// `on_retry` runs before each delay with the upcoming retry number
    /// (starting at 1) and the error that triggered it. Errors for which
    /// [`PlaybackError::is_retryable`] is false end the loop immediately.
    pub async fn run<T, Op, Fut, OnRetry>(&self, mut operation: Op, mut on_retry: OnRetry) -> RetryOutcome<T>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        OnRetry: FnMut(u32, &PlaybackError),
    {
        let mut retry_count = 0;

        loop {
            match operation(retry_count).await {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: retry_count + 1,
                    }
                }
                Err(error) if !error.is_retryable() => {
                    debug!(error = %error, "Not retrying");
                    return RetryOutcome::Aborted {
                        error,
                        attempts: retry_count + 1,
                    };
                }
                Err(error) if retry_count < self.max_retries => {
                    retry_count += 1;
                    warn!(
                        error = %error,
                        attempt = retry_count,
                        max_retries = self.max_retries,
                        "Attempt failed, retrying"
                    );
                    on_retry(retry_count, &error);
                    tokio::time::sleep(self.delay).await;
                }
                Err(error) => {
                    return RetryOutcome::Exhausted {
                        error,
                        attempts: retry_count + 1,
                    }
                }
            }
        }
    }
}
