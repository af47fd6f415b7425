//! Exponential backoff configuration and delay computation.
//!
//! Failed attempts wait `initial_delay * backoff_multiplier^attempt`, capped
//! at `max_delay`, before the next try. Rate-limited responses bypass this
//! schedule entirely and honor the server-specified delay instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponent clamp so large attempt numbers cannot overflow the delay math.
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Retry behavior for a client.
///
/// `max_retries` counts retries after the initial attempt, so a request makes
/// up to `max_retries + 1` attempts in total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound on any computed backoff delay.
    pub max_delay: Duration,

    /// Multiplier applied to the delay for each consecutive retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Computes the backoff delay after the given zero-based attempt.
    ///
    /// Attempt 0 waits `initial_delay`, attempt 1 waits
    /// `initial_delay * backoff_multiplier`, and so on, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let factor = self.backoff_multiplier.powi(exponent as i32);
        let raw_secs = self.initial_delay.as_secs_f64() * factor;
        let capped_secs = raw_secs.min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(capped_secs)
    }
}
