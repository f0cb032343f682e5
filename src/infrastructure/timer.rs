use crate::types::{RECONNECT_BACKOFF_EXPONENT, RECONNECT_BASE_DELAY};
use std::time::Duration;

/// Delay policy for automatic reconnection.
///
/// The delay is `base * 2^exponent` with the exponent pinned at
/// [`RECONNECT_BACKOFF_EXPONENT`] (zero), so every attempt waits the base delay.
#[derive(Debug, Clone)]
pub struct ReconnectTimer {
    attempts: u32,
    base_delay: Duration,
}

impl ReconnectTimer {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            attempts: 0,
            base_delay,
        }
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(RECONNECT_BACKOFF_EXPONENT))
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the timer after a successful open
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for ReconnectTimer {
    fn default() -> Self {
        Self::new(Duration::from_millis(RECONNECT_BASE_DELAY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay_is_five_seconds() {
        let mut timer = ReconnectTimer::default();
        assert_eq!(timer.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_does_not_grow_across_attempts() {
        // Known oddity: the backoff exponent is fixed, the delay stays constant.
        let mut timer = ReconnectTimer::new(Duration::from_millis(250));
        let delays: Vec<_> = (0..5).map(|_| timer.next_delay()).collect();

        assert!(delays.iter().all(|d| *d == Duration::from_millis(250)));
        assert_eq!(timer.attempts(), 5);
    }

    #[test]
    fn test_reset_clears_attempts() {
        let mut timer = ReconnectTimer::default();
        timer.next_delay();
        timer.next_delay();
        timer.reset();
        assert_eq!(timer.attempts(), 0);
    }
}
