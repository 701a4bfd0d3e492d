//! # Retry Logic and Backoff Strategies
//!
//! Decides whether a retryable failure is attempted again and how long the
//! drain loop waits before moving on.
//!
//! The default policy is exponential: `backoff(n) = min(base * 2^n, cap)`
//! with a base of one second, a cap of thirty seconds, and a ceiling of five
//! attempts. The delay is deterministic.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use floatplan::offline::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.backoff(1), Duration::from_secs(2));
//! assert_eq!(policy.decide(5), RetryDecision::GiveUp);
//! ```

use std::time::Duration;

/// Attempts after which an operation is dropped as exhausted
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Backoff strategy configuration
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed interval between retries
    Fixed {
        /// Wait between attempts
        interval: Duration,
    },
    /// `min(base * 2^n, cap)`
    Exponential {
        /// Delay unit
        base: Duration,
        /// Upper bound on any single delay
        cap: Duration,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        }
    }
}

impl BackoffStrategy {
    /// Delay after the `retry_count`-th failure
    pub fn delay(&self, retry_count: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed { interval } => *interval,
            BackoffStrategy::Exponential { base, cap } => {
                // 2^31 already dwarfs any sane cap.
                let factor = 2u32.saturating_pow(retry_count.min(31));
                base.saturating_mul(factor).min(*cap)
            }
        }
    }
}

/// What to do after a retryable failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep the operation; wait this long before the next one
    RetryAfter(Duration),
    /// Ceiling reached; drop the operation
    GiveUp,
}

/// Retry ceiling plus backoff strategy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Failed attempts at which an operation is dropped
    pub max_retries: u32,
    /// Delay schedule
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRY_ATTEMPTS,
            strategy: BackoffStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `retry_count`-th failure
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.strategy.delay(retry_count)
    }

    /// Decide the fate of an operation that has now failed `retry_count` times
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count >= self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.backoff(retry_count))
        }
    }
}
