use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::{FetchError, ProviderId};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Local per-provider request budget, checked before every upstream call.
///
/// Exhausting the budget short-circuits to a `RateLimited` error without
/// touching the network, so the chain falls through to the next provider.
#[derive(Clone)]
pub struct QuotaGuard {
    provider: ProviderId,
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
}

impl std::fmt::Debug for QuotaGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGuard")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl QuotaGuard {
    pub fn new(provider: ProviderId, quota_window: Duration, quota_limit: u32) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            provider,
            limiter: Arc::new(RateLimiter::direct(quota)),
            clock: DefaultClock::default(),
        }
    }

    pub fn per_minute(provider: ProviderId, quota_limit: u32) -> Self {
        Self::new(provider, Duration::from_secs(60), quota_limit)
    }

    /// Takes one cell of budget or reports how long until the next one frees up.
    pub fn check(&self) -> Result<(), FetchError> {
        match self.limiter.check() {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Err(FetchError::rate_limited(
                    self.provider,
                    format!(
                        "local quota exhausted; next request allowed in {}ms",
                        wait.as_millis()
                    ),
                ))
            }
        }
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_minute(burst))
        .allow_burst(burst)
}
