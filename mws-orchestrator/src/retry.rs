//! Poll loop shared by the lifecycle operations.
//!
//! Each attempt classifies itself as [`Attempt::Success`], [`Attempt::Retry`] or
//! [`Attempt::Fatal`]. Retries are swallowed until the deadline; the last retry
//! reason is carried in the timeout error. All waiting goes through
//! `tokio::time`, so tests drive the loop with a paused clock.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ProvisionError, Result};

/// Upper bound for any single wait. Longer timeouts are clamped to it.
pub const MAX_WAIT: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Verdict of a single poll.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    Retry(String),
    Fatal(ProvisionError),
}

/// How often and for how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    /// When set, the interval doubles after each retry up to this cap.
    pub max_interval: Option<Duration>,
}

impl PollPolicy {
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            max_interval: None,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_backoff(self, max_interval: Duration) -> Self {
        Self {
            max_interval: Some(max_interval),
            ..self
        }
    }
}

/// Run `attempt` until it succeeds, fails fatally, the deadline passes or `cancel` fires.
///
/// A retry is followed by a sleep only if the next poll would still start before
/// the deadline, so a timeout of `n * interval` allows exactly `n` polls.
pub async fn poll_until<T, F, Fut>(
    operation: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout.min(MAX_WAIT);
    let mut interval = policy.interval;
    let mut last_message = String::new();
    let mut polls = 0u32;

    loop {
        polls += 1;
        let verdict = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(cancelled(operation, last_message));
            }
            verdict = timeout_at(deadline, attempt()) => verdict,
        };

        match verdict {
            Ok(Attempt::Success(value)) => {
                debug!(operation, polls, "poll loop finished");
                return Ok(value);
            }
            Ok(Attempt::Fatal(err)) => return Err(err),
            Ok(Attempt::Retry(message)) => {
                debug!(operation, polls, %message, "retrying");
                last_message = message;
            }
            Err(_) => {
                return Err(timed_out(operation, start.elapsed(), last_message));
            }
        }

        let next_poll = Instant::now().checked_add(interval);
        if next_poll.map_or(true, |next| next >= deadline) {
            return Err(timed_out(operation, start.elapsed(), last_message));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(cancelled(operation, last_message));
            }
            _ = sleep(interval) => {}
        }

        if let Some(max) = policy.max_interval {
            interval = interval.saturating_mul(2).min(max);
        }
    }
}

fn timed_out(operation: &str, elapsed: Duration, last_message: String) -> ProvisionError {
    ProvisionError::Timeout {
        operation: operation.to_string(),
        elapsed,
        last_message,
    }
}

fn cancelled(operation: &str, last_message: String) -> ProvisionError {
    ProvisionError::Cancelled {
        operation: operation.to_string(),
        last_message,
    }
}
