//! Reconnect backoff policies.
//!
//! [`RetryPolicy`] computes the delay before each reconnect attempt. The
//! connection manager never gives up, so `max_retries` is `None` for the
//! viewer's policy; bounded policies exist for hosts that want them.
//!
//! # Determinism
//!
//! Backoff delays use fixed formulas (no jitter/randomness) so that
//! scenario tests can reproduce exact timer sequences.
//!
//! # Example
//!
//! ```
//! use pumlview_core::retry::{BackoffStrategy, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::unbounded(BackoffStrategy::Exponential {
//!     base_ms: 500,
//!     max_ms: 10_000,
//! });
//!
//! assert_eq!(policy.delay(0), Duration::from_millis(500));
//! assert_eq!(policy.delay(1), Duration::from_millis(1_000));
//! assert_eq!(policy.delay(10), Duration::from_millis(10_000));
//! ```

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use web_time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed {
        /// Delay in milliseconds.
        delay_ms: u64,
    },
    /// Exponential backoff: `base_ms * 2^attempt`, capped at `max_ms`.
    Exponential {
        /// Base delay in milliseconds.
        base_ms: u64,
        /// Maximum delay cap in milliseconds.
        max_ms: u64,
    },
}

/// A retry policy with an optional attempt bound and a backoff strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts; `None` retries forever.
    pub max_retries: Option<u32>,
    /// Backoff strategy between retries.
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Create a bounded retry policy.
    pub fn new(max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_retries: Some(max_retries),
            backoff,
        }
    }

    /// Retry forever with the given backoff.
    pub fn unbounded(backoff: BackoffStrategy) -> Self {
        Self {
            max_retries: None,
            backoff,
        }
    }

    /// Compute the delay before the given attempt (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        match &self.backoff {
            BackoffStrategy::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            BackoffStrategy::Exponential { base_ms, max_ms } => {
                let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                let delay = base_ms.saturating_mul(multiplier);
                Duration::from_millis(delay.min(*max_ms))
            }
        }
    }

    /// Whether another attempt is allowed after `attempt` failures.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_retries.is_none_or(|max| attempt < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(BackoffStrategy::Exponential {
            base_ms: 500,
            max_ms: 10_000,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_constant_delay() {
        let policy = RetryPolicy::new(3, BackoffStrategy::Fixed { delay_ms: 100 });
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..7).map(|a| policy.delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 1_000, 2_000, 4_000, 8_000, 10_000, 10_000]);
    }

    #[test]
    fn exponential_backoff_overflow_saturates() {
        let policy = RetryPolicy::unbounded(BackoffStrategy::Exponential {
            base_ms: u64::MAX / 2,
            max_ms: u64::MAX,
        });
        // Should not panic on overflow
        let _ = policy.delay(30);
        let _ = policy.delay(200);
    }

    #[test]
    fn unbounded_policy_always_allows() {
        let policy = RetryPolicy::default();
        assert!(policy.allows(0));
        assert!(policy.allows(u32::MAX));
    }

    #[test]
    fn bounded_policy_stops_at_max() {
        let policy = RetryPolicy::new(2, BackoffStrategy::Fixed { delay_ms: 1 });
        assert!(policy.allows(0));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
    }
}
