//! # Backoff
//!
//! Two backoff schedules are used by the controller:
//!
//! - [`FibonacciBackoff`] paces reconcile-level requeues of a failing
//!   AgeSecret: 1m, 1m, 2m, 3m, 5m, 8m, then 10m (capped).
//! - [`ExponentialBackoff`] paces in-call retries of a single native secret
//!   API request: start, 2x start, 4x start... up to a cap.
//!
//! ```rust
//! use age_secret_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 120);
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator, in whole minutes
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    max_minutes: u64,
    /// Pair of (current, next) values in minutes
    window: (u64, u64),
    attempts: u32,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            window: (min_minutes, min_minutes),
            attempts: 0,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let (current, next) = self.window;
        let current = current.min(self.max_minutes);
        self.window = (next, current.saturating_add(next).min(self.max_minutes));
        self.attempts = self.attempts.saturating_add(1);
        current.saturating_mul(60)
    }

    /// Get the next backoff duration as a `Duration` and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Number of backoffs handed out since creation or the last reset
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.window = (self.min_minutes, self.min_minutes);
        self.attempts = 0;
    }
}

/// Doubling backoff for in-call retries
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    start: Duration,
    max: Duration,
    current: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(start: Duration, max: Duration) -> Self {
        Self {
            start,
            max,
            current: start.min(max),
        }
    }

    /// Return the current delay and double it for the next call
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.start.min(self.max);
    }
}
