use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::crowdin::SyncError;

/// How often a Crowdin call is repeated before the sync stage gives up.
///
/// Pauses double after each failed attempt, starting at `first_pause` and
/// never exceeding `longest_pause`. Only failures that
/// [`SyncError::is_retryable`] accepts are repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, the first one included
    pub attempts: u32,
    pub first_pause: Duration,
    pub longest_pause: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, first_pause: Duration) -> Self {
        Self {
            attempts,
            first_pause,
            longest_pause: Duration::from_secs(10),
        }
    }

    /// Policy used for live runs: `attempts` tries, pausing 2s then 4s
    pub fn for_attempts(attempts: u32) -> Self {
        Self::new(attempts, Duration::from_secs(2))
    }

    /// Pause before retry number `retry` (1 for the second attempt)
    fn pause_before(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(16);
        self.first_pause
            .saturating_mul(1 << doublings)
            .min(self.longest_pause)
    }

    /// Run `call` until it succeeds, fails permanently or runs out of attempts.
    ///
    /// Zero attempts still makes one call.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{}: succeeded on attempt {}/{}", operation, attempt, attempts);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                debug!("{}: not retrying: {}", operation, error);
                return Err(error);
            }
            if attempt == attempts {
                warn!("{}: giving up after {} attempts: {}", operation, attempts, error);
                return Err(error);
            }

            let pause = self.pause_before(attempt);
            warn!(
                "{}: attempt {}/{} failed ({}), retrying in {:?}",
                operation, attempt, attempts, error, pause
            );
            sleep(pause).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_attempts(3)
    }
}
