//! Retry policy for outbound API calls.
//!
//! The policy is a pure function from (attempt index, observed outcome) to
//! the next action, so it can be exercised without any network.
//!
//! - 2xx/3xx responses are accepted.
//! - 429 responses back off linearly: `base_wait * (attempt + 1)`.
//! - 5xx responses and transport failures wait a fixed delay.
//! - Any other 4xx is rejected immediately.
//! - A retryable outcome on the last permitted attempt gives up without waiting.

use crate::config::Config;
use std::time::Duration;

/// What a single attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The server answered with this status code.
    Status(u16),
    /// The request failed before a status was received.
    Transport,
}

/// Why an attempt is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    ServerError,
    Transport,
}

/// Next action after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Hand the response to the caller.
    Accept,
    /// Fail now; the status is not worth retrying.
    Reject,
    /// Wait `delay` and try again.
    RetryAfter { delay: Duration, reason: RetryReason },
    /// Retryable failure, but no attempts remain.
    GiveUp,
}

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_wait: Duration,
    fixed_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one attempt.
    pub fn new(max_attempts: u32, base_wait: Duration, fixed_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_wait,
            fixed_delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs(config.base_wait_seconds),
            Duration::from_secs(config.retry_delay_seconds),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait applied after a 429 on the zero-based `attempt`.
    pub fn rate_limit_wait(&self, attempt: u32) -> Duration {
        self.base_wait.saturating_mul(attempt.saturating_add(1))
    }

    /// Decides what to do after the zero-based `attempt` produced `outcome`.
    pub fn decide(&self, attempt: u32, outcome: Outcome) -> RetryDecision {
        let (delay, reason) = match outcome {
            Outcome::Status(status) if status < 400 => return RetryDecision::Accept,
            Outcome::Status(429) => (self.rate_limit_wait(attempt), RetryReason::RateLimited),
            Outcome::Status(status) if status >= 500 => {
                (self.fixed_delay, RetryReason::ServerError)
            }
            Outcome::Status(_) => return RetryDecision::Reject,
            Outcome::Transport => (self.fixed_delay, RetryReason::Transport),
        };

        if attempt.saturating_add(1) >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter { delay, reason }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Bookkeeping for one logical call; never outlives it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Zero-based index of the attempt in flight.
    pub attempt: u32,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
}

impl RetryState {
    pub fn record(&mut self, outcome: Outcome, error: Option<String>) {
        match outcome {
            Outcome::Status(status) => {
                self.last_status = Some(status);
                self.last_error = None;
            }
            Outcome::Transport => {
                self.last_status = None;
                self.last_error = error;
            }
        }
    }

    /// Number of attempts made so far, counting the one in flight.
    pub fn attempts(&self) -> u32 {
        self.attempt + 1
    }
}
