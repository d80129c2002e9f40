//! Retry policy for the primary provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::FetchError;

/// Wait applied before re-asking the primary after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    Fixed { delay: Duration },
    /// `base * factor^attempt`, capped at `max`, optionally spread by +/-50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        let (base, factor, max, jitter) = match self {
            Self::Fixed { delay } => return delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => (base, factor, max, jitter),
        };

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let capped = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
        let millis = (capped * 1_000.0) as u64;
        if !jitter || millis == 0 {
            return Duration::from_millis(millis);
        }

        let spread = millis / 2;
        let low = millis - spread;
        Duration::from_millis(fastrand::u64(low..=millis + spread))
    }
}

/// Retry configuration applied to the primary provider only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether `error` on the given 0-based retry attempt earns another try.
    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        attempt < self.max_retries && error.retryable()
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
