//! Fixed-window rate limiter, one per provider

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

/// `limit` requests per `window`. A request is admitted only while the
/// current window's count is below the limit; the window restarts on the
/// first request after it elapses.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<Window>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            limit,
            window,
            clock,
            state: Mutex::new(Window { started, count: 0 }),
        }
    }

    /// `limit` requests per 60 seconds
    pub fn per_minute(limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self::new(limit, Duration::seconds(60), clock)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Take one slot if the window has room
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut window = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if now - window.started >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.limit {
            window.count += 1;
            true
        } else {
            false
        }
    }

    /// Slots left in the current window
    pub fn remaining(&self) -> u32 {
        let now = self.clock.now();
        let window = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if now - window.started >= self.window {
            self.limit
        } else {
            self.limit.saturating_sub(window.count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_limit_within_window() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = FixedWindowLimiter::per_minute(3, clock.clone());

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.remaining(), 0);

        clock.advance(Duration::seconds(59));
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_window_resets() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = FixedWindowLimiter::per_minute(1, clock.clone());

        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        clock.advance(Duration::seconds(60));
        assert_eq!(limiter.remaining(), 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_zero_limit_never_admits() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = FixedWindowLimiter::per_minute(0, clock);
        assert!(!limiter.try_acquire());
    }
}
