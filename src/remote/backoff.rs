//! Exponential backoff with jitter for transport retries.

use std::time::Duration;

/// Exponential backoff calculator with jitter.
///
/// Delay for attempt `n` is `base * 2^n`, capped at `max`, plus up to a
/// quarter of that again as random jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl Backoff {
    /// Create a new backoff starting at `base_ms` with a cap of `max_ms`.
    #[must_use]
    pub const fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            attempt: 0,
        }
    }

    /// Get the next delay and advance the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self
            .base_ms
            .saturating_mul(1u64.checked_shl(self.attempt).unwrap_or(u64::MAX));
        let capped = exp.min(self.max_ms);
        let jitter = rand::random::<u64>() % (capped / 4 + 1);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(capped + jitter)
    }

    /// Number of delays handed out since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(250, 5_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let mut backoff = Backoff::new(100, 350);

        assert!(backoff.next_delay().as_millis() >= 100);
        assert!(backoff.next_delay().as_millis() >= 200);
        let third = backoff.next_delay().as_millis();
        assert!((350..=350 + 350 / 4).contains(&third));
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_backoff_survives_many_attempts() {
        let mut backoff = Backoff::new(100, 1_000);
        for _ in 0..80 {
            assert!(backoff.next_delay().as_millis() <= 1_250);
        }
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.next_delay().as_millis() < 200);
    }
}
