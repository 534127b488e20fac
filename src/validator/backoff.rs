//! Retry delay schedule
//!
//! Pure arithmetic: the caller samples the jitter, so delays are fully
//! deterministic in tests.

use std::time::Duration;

/// Largest exponent fed into `2^attempt`; anything beyond is saturated
/// by the cap anyway and `powi` with huge exponents is just wasted range.
const MAX_EXPONENT: u32 = 32;

/// Exponential backoff with jitter: `base * (2^attempt + jitter)`,
/// capped at `cap`.
///
/// With the default one-second base this is the classic
/// `2^attempt + uniform(0, 1)` seconds schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Unit of the schedule (default: 1s)
    pub base: Duration,
    /// Upper bound on any single delay (default: 30s)
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt `attempt` (0-based).
    ///
    /// `unit_jitter` is clamped to `[0, 1]`; the result is never negative
    /// and never exceeds the cap.
    #[must_use]
    pub fn delay(&self, attempt: u32, unit_jitter: f64) -> Duration {
        let jitter = if unit_jitter.is_finite() {
            unit_jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let factor = 2f64.powi(attempt.min(MAX_EXPONENT) as i32) + jitter;
        let raw = self.base.as_secs_f64() * factor;
        Duration::from_secs_f64(raw.min(self.cap.as_secs_f64()))
    }
}
