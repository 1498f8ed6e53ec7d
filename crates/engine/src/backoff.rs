//! Reconnect backoff for feed subscriptions

use rand::Rng;
use std::time::Duration;

/// Doubling delay with a cap and symmetric jitter
///
/// The n-th consecutive failure waits `min(cap, base * 2^n)`, scaled by a
/// random factor in `[1 - jitter, 1 + jitter]`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
    jitter: f64,
    failures: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 0.1)
    }
}

impl ExponentialBackoff {
    /// `jitter` is clamped to `[0, 1]`
    pub fn new(base: Duration, cap: Duration, jitter: f64) -> Self {
        Self {
            base,
            cap,
            jitter: if jitter.is_nan() { 0.0 } else { jitter.clamp(0.0, 1.0) },
            failures: 0,
        }
    }

    /// Delay before the next retry; counts one more failure
    pub fn next_delay(&mut self) -> Duration {
        let doubled = self
            .base
            .checked_mul(1u32 << self.failures.min(31))
            .unwrap_or(self.cap);
        let delay = doubled.min(self.cap);
        self.failures = self.failures.saturating_add(1);

        if self.jitter == 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        delay.mul_f64(factor)
    }

    /// Forget past failures once a stream opens
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
