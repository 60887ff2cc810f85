//! Backoff schedule for the verification service's status codes.

use crate::receipt::StatusCode;
use std::time::Duration;

/// What to do with a decoded service response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Code 1: parse and return.
    Accept,
    /// Retryable code: wait this long, then try again.
    Retry(Duration),
    /// Terminal code: parse and return without retrying.
    Terminal,
}

/// Retry policy keyed on the service status code.
///
/// | code | retry | delay |
/// |------|-------|-------|
/// | 2    | yes   | `base * 1.5^attempt` |
/// | 3    | yes   | `base * 2^attempt` |
/// | 4    | yes   | `base * 2` |
/// | other| no    | |
///
/// Transport failures back off as `base * 2^attempt`. The policy holds no
/// state; the caller counts attempts (zero-based) and does the sleeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    base_delay_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RetryPolicy {
    /// Create a policy with the given base delay in seconds.
    #[must_use]
    pub fn new(base_delay_secs: f64) -> Self {
        Self { base_delay_secs }
    }

    /// Base delay in seconds.
    #[must_use]
    pub fn base_delay_secs(&self) -> f64 {
        self.base_delay_secs
    }

    /// Whether the code may succeed if asked again.
    #[must_use]
    pub fn is_retryable(code: i64) -> bool {
        matches!(
            StatusCode::from(code),
            StatusCode::NotReady | StatusCode::RateLimited | StatusCode::WaitBeforeRetry
        )
    }

    /// Decide how to handle `code` received on the zero-based `attempt`.
    #[must_use]
    pub fn decide(&self, code: i64, attempt: u32) -> RetryDecision {
        match StatusCode::from(code) {
            StatusCode::Success => RetryDecision::Accept,
            StatusCode::NotReady => {
                RetryDecision::Retry(self.scaled(1.5_f64.powi(exponent(attempt))))
            }
            StatusCode::RateLimited => {
                RetryDecision::Retry(self.scaled(2.0_f64.powi(exponent(attempt))))
            }
            StatusCode::WaitBeforeRetry => RetryDecision::Retry(self.scaled(2.0)),
            StatusCode::Invalid | StatusCode::Unavailable | StatusCode::Other(_) => {
                RetryDecision::Terminal
            }
        }
    }

    /// Delay for `code` on `attempt`, if the code is retryable.
    #[must_use]
    pub fn delay_for(&self, code: i64, attempt: u32) -> Option<Duration> {
        match self.decide(code, attempt) {
            RetryDecision::Retry(delay) => Some(delay),
            RetryDecision::Accept | RetryDecision::Terminal => None,
        }
    }

    /// Delay after a network-level failure on `attempt`.
    #[must_use]
    pub fn transport_delay(&self, attempt: u32) -> Duration {
        self.scaled(2.0_f64.powi(exponent(attempt)))
    }

    fn scaled(&self, factor: f64) -> Duration {
        // 0 * inf is NaN for large attempts
        if self.base_delay_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.base_delay_secs * factor).unwrap_or(Duration::MAX)
    }
}

fn exponent(attempt: u32) -> i32 {
    i32::try_from(attempt).unwrap_or(i32::MAX)
}
