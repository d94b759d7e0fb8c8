//! Truncated exponential backoff shared by the connect loop and the
//! pending-block fetchers.

use std::time::{Duration, Instant};

/// Ceiling for a single backoff delay: four hours.
pub const BACKOFF_CEILING_SECS: u64 = 14_400;

/// Quiet period after which the attempt counter resets.
pub const ATTEMPT_RESET: Duration = Duration::from_secs(12 * 60 * 60);

/// Delay before attempt `n`: `floor((2^n - 1) / 2)` seconds, clamped to
/// [`BACKOFF_CEILING_SECS`].
pub fn delay_secs(attempt: u32) -> u64 {
    let n = attempt.min(63);
    let raw = ((1u128 << n) - 1) / 2;
    raw.min(BACKOFF_CEILING_SECS as u128) as u64
}

/// Tracks consecutive failures and yields the delay before each retry.
#[derive(Debug)]
pub struct RetryPolicy {
    attempts: u32,
    last_failure: Option<Instant>,
}

impl RetryPolicy {
    /// A policy with no recorded failures.
    pub fn new() -> Self {
        Self {
            attempts: 0,
            last_failure: None,
        }
    }

    /// Record a failure and return the delay to wait before retrying.
    ///
    /// The attempt counter resets whenever [`ATTEMPT_RESET`] passed
    /// since the previous failure.
    pub fn next_delay(&mut self) -> Duration {
        let now = Instant::now();
        if let Some(last) = self.last_failure {
            if now.duration_since(last) >= ATTEMPT_RESET {
                self.attempts = 0;
            }
        }
        self.attempts += 1;
        self.last_failure = Some(now);
        Duration::from_secs(delay_secs(self.attempts))
    }

    /// Consecutive failures recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[cfg(test)]
    fn backdate_last_failure(&mut self, by: Duration) {
        if let Some(last) = self.last_failure {
            self.last_failure = last.checked_sub(by);
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
