//! Growing delays for polling loops.

use rand::Rng;
use std::time::Duration;

/// Doubling delay schedule with a ceiling and up to 10% added jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Delay before the next poll. The first call returns `base`.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.ceiling_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay + jitter(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Un-jittered delay for `attempt` (0-based).
    fn ceiling_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

fn jitter(delay: Duration) -> Duration {
    let range_ms = (delay.as_millis() / 10) as u64;
    if range_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..range_ms))
}
