use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Runtime circuit state for a provider's upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Point-in-time view of a provider's health, exposed read-only for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// A half-open trial call is in flight.
    probing: bool,
    successes: u64,
    failures: u64,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probing: false,
            successes: 0,
            failures: 0,
        }
    }
}

impl CircuitInner {
    fn cooled_down(&self, open_timeout: Duration) -> bool {
        self.opened_at
            .is_some_and(|opened_at| opened_at.elapsed() >= open_timeout)
    }
}

/// Thread-safe circuit breaker with rolling success/failure counters.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a call could be admitted right now. Changes nothing.
    pub fn is_available(&self) -> bool {
        let inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !inner.probing,
            CircuitState::Open => inner.cooled_down(self.config.open_timeout),
        }
    }

    /// Admits a call. A cooled-down open circuit turns half-open, and a
    /// half-open circuit admits a single trial call until it is recorded.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen if inner.probing => false,
            CircuitState::HalfOpen => {
                inner.probing = true;
                true
            }
            CircuitState::Open if inner.cooled_down(self.config.open_timeout) => {
                inner.state = CircuitState::HalfOpen;
                inner.opened_at = None;
                inner.probing = true;
                true
            }
            CircuitState::Open => false,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probing = false;
        inner.successes = inner.successes.saturating_add(1);
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.probing = false;
        inner.failures = inner.failures.saturating_add(1);
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.config.failure_threshold
        {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Counts a failure that says nothing about upstream availability (quota, bad symbol, credentials).
    /// A half-open trial that ends this way leaves the circuit half-open for the next one.
    pub fn record_rejection(&self) {
        let mut inner = self.lock();
        inner.probing = false;
        inner.failures = inner.failures.saturating_add(1);
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let inner = self.lock();
        HealthSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            successes: inner.successes,
            failures: inner.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(10),
        });

        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_available());
        assert!(!breaker.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_to_half_open_after_timeout_then_closes_on_success() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_secs(5),
        });

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.try_acquire());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.is_available());
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.try_acquire());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 1);
    }

    #[test]
    fn rejections_count_without_tripping() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_secs(10),
        });

        breaker.record_rejection();
        breaker.record_rejection();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failures, 2);
        assert!(breaker.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_one_trial_call_at_a_time() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_secs(5),
        });
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;

        let admitted = (0..5).filter(|_| breaker.try_acquire()).count();
        assert_eq!(admitted, 1);
        assert!(!breaker.is_available());

        // a failed trial reopens and restarts the cool-down
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.try_acquire());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.try_acquire());
        breaker.record_rejection();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire());
    }
}
