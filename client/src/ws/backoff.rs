//! Exponential backoff for feed reconnects and REST retries.
//!
//! Attempt `n` (1-based) waits `min(base * 2^(n-1), cap)`; after
//! `max_attempts` attempts the schedule is exhausted.

use std::time::Duration;

use super::config::WsConfig;

/// Exponential backoff schedule with an attempt cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    /// Creates a schedule.
    #[must_use]
    pub const fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
            attempt: 0,
        }
    }

    /// Creates a schedule from the reconnect settings of a config.
    #[must_use]
    pub const fn from_config(config: &WsConfig) -> Self {
        Self::new(
            config.reconnect_delay,
            config.max_reconnect_delay,
            config.max_reconnect_attempts,
        )
    }

    /// Returns the delay before the given 1-based attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Claims the next attempt, returning its number and delay.
    ///
    /// Returns `None` once `max_attempts` attempts have been claimed.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some((self.attempt, self.delay_for(self.attempt)))
    }

    /// Returns the attempts claimed since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Returns the delay the next attempt would wait.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.delay_for(self.attempt + 1)
    }

    /// Returns true when no attempts remain.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Returns the configured attempt cap.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Resets the attempt counter, and with it the delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_millis(1000), Duration::from_millis(30_000), 5)
    }

    #[test]
    fn test_delay_doubles() {
        let b = backoff();
        assert_eq!(b.delay_for(1), Duration::from_millis(1000));
        assert_eq!(b.delay_for(2), Duration::from_millis(2000));
        assert_eq!(b.delay_for(3), Duration::from_millis(4000));
        assert_eq!(b.delay_for(4), Duration::from_millis(8000));
        assert_eq!(b.delay_for(5), Duration::from_millis(16_000));
    }

    #[test]
    fn test_delay_capped() {
        let b = backoff();
        assert_eq!(b.delay_for(6), Duration::from_millis(30_000));
        assert_eq!(b.delay_for(40), Duration::from_millis(30_000));
        assert_eq!(b.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_delay_matches_formula() {
        let b = Backoff::new(Duration::from_millis(250), Duration::from_millis(5_000), 20);
        for n in 1..=20u32 {
            let expected = (250u64 << (n - 1)).min(5_000);
            assert_eq!(b.delay_for(n), Duration::from_millis(expected));
        }
    }

    #[test]
    fn test_next_attempt_until_exhausted() {
        let mut b = backoff();
        let mut seen = Vec::new();
        while let Some((attempt, delay)) = b.next_attempt() {
            seen.push((attempt, delay.as_millis()));
        }
        assert_eq!(
            seen,
            vec![(1, 1000), (2, 2000), (3, 4000), (4, 8000), (5, 16_000)]
        );
        assert!(b.is_exhausted());
        assert!(b.next_attempt().is_none());
    }

    #[test]
    fn test_reset_restores_initial_values() {
        let mut b = backoff();
        b.next_attempt();
        b.next_attempt();
        b.next_attempt();
        assert_eq!(b.current_delay(), Duration::from_millis(8000));

        b.reset();

        assert_eq!(b.attempts(), 0);
        assert_eq!(b.current_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_attempts_exhausted_immediately() {
        let mut b = Backoff::new(Duration::from_millis(10), Duration::from_millis(10), 0);
        assert!(b.next_attempt().is_none());
    }
}
