//! Retry delay policies.

use std::time::Duration;

/// Maps a retry attempt number (1 = first retry) to the delay before it.
///
/// Implemented for [`ExponentialBackoff`] and for any
/// `Fn(u32) -> Duration + Send + Sync` closure, so callers can plug in jitter,
/// caps or a zero delay for tests.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// `delay(n) = ((2^n - 1) / 2) * unit`.
///
/// With the default one-second unit: 500ms, 1500ms, 3500ms, 7500ms, ...
/// Attempt 0 yields no delay. Saturates instead of overflowing for large `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    unit: Duration,
}

impl ExponentialBackoff {
    pub const fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 1u128
            .checked_shl(attempt)
            .map(|pow| pow - 1)
            .unwrap_or(u128::MAX);
        let nanos = self.unit.as_nanos().saturating_mul(factor) / 2;

        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}
