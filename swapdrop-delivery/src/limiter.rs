//! Pickup attempt limiting.
//!
//! Every pickup attempt on a leg that is actually waiting for collection
//! spends one cell of that leg's bucket, so a withdrawal code cannot be
//! brute-forced at a pickup counter.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tracing::warn;

use swapdrop_core::constants::{DEFAULT_PICKUP_ATTEMPTS_PER_WINDOW, DEFAULT_PICKUP_ATTEMPT_WINDOW_SECS};
use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::types::LegId;

/// Attempt budget per leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Attempts allowed in a burst
    pub attempts_per_window: u32,
    /// Time for the full budget to replenish
    pub window_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            attempts_per_window: DEFAULT_PICKUP_ATTEMPTS_PER_WINDOW,
            window_secs: DEFAULT_PICKUP_ATTEMPT_WINDOW_SECS,
        }
    }
}

impl LimiterConfig {
    fn quota(&self) -> Result<Quota> {
        let burst = NonZeroU32::new(self.attempts_per_window).ok_or_else(|| {
            SwapError::ConfigError("pickup attempts per window must be at least 1".into())
        })?;
        // One cell comes back every window / burst, so a drained bucket is
        // full again after one window.
        let replenish = Duration::from_secs(self.window_secs) / burst.get();
        let quota = Quota::with_period(replenish).ok_or_else(|| {
            SwapError::ConfigError("pickup attempt window must be positive".into())
        })?;
        Ok(quota.allow_burst(burst))
    }
}

/// Keyed token bucket over leg IDs.
pub struct PickupAttemptLimiter {
    limiter: DefaultKeyedRateLimiter<LegId>,
    clock: DefaultClock,
}

impl PickupAttemptLimiter {
    /// Creates a limiter.
    ///
    /// # Errors
    /// `ConfigError` for a zero budget or zero window.
    pub fn new(config: &LimiterConfig) -> Result<Self> {
        Ok(Self {
            limiter: RateLimiter::keyed(config.quota()?),
            clock: DefaultClock::default(),
        })
    }

    /// Spends one attempt on `leg_id`.
    ///
    /// # Errors
    /// `TooManyAttempts` with the wait until the next attempt is allowed.
    pub fn check(&self, leg_id: LegId) -> Result<()> {
        self.limiter.check_key(&leg_id).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            warn!(leg_id = %leg_id, retry_after_secs, "pickup attempts exhausted");
            SwapError::TooManyAttempts { retry_after_secs }
        })
    }

    /// Forgets buckets that are full again.
    pub fn shrink(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of legs currently tracked.
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    /// Returns true if no leg is tracked.
    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

impl std::fmt::Debug for PickupAttemptLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickupAttemptLimiter")
            .field("tracked_legs", &self.len())
            .finish()
    }
}
