//! Millisecond clocks for the query engine.
//!
//! - [`SystemClock`] reads a monotonic [`Instant`] and really sleeps.
//! - [`ManualClock`] is a test clock: time only moves when told to, and
//!   [`Clock::sleep`] advances it instead of blocking, so a full
//!   `run_until_done` over several simulated seconds finishes instantly.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use crate::application::ports::Clock;

/// Monotonic wall clock; time zero is the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests.  Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading 0 ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jumps to an absolute time.  Must not move backwards.
    pub fn set(&self, ms: u64) {
        self.now_ms.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.advance(ms.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_starts_at_zero_and_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_ms(), 0);

        clock.advance(120);

        assert_eq!(clock.now_ms(), 120);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        // Arrange
        let clock = ManualClock::new();
        let handle = clock.clone();

        // Act
        handle.set(5000);

        // Assert
        assert_eq!(clock.now_ms(), 5000);
    }

    #[test]
    fn test_manual_clock_set_never_goes_backwards() {
        let clock = ManualClock::new();
        clock.set(100);
        clock.set(50);
        assert_eq!(clock.now_ms(), 100);
    }

    #[test]
    fn test_manual_clock_sleep_advances_instead_of_blocking() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(1));
        clock.sleep(Duration::ZERO);
        assert_eq!(clock.now_ms(), 2);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_ms();
        clock.sleep(Duration::from_millis(5));
        assert!(clock.now_ms() >= first + 5);
    }
}
