//! Minimum-interval send gate.
//!
//! The receiver is a microcontroller reading a slow serial line.  Flooding it
//! with a directional command on every slider tick only fills its UART
//! buffer, so outgoing directional commands are spaced by a minimum interval.
//!
//! The gate is deliberately lossy: a rejected send is dropped, not queued.
//! The peer keeps executing the last accepted command, and the next
//! operator event naturally carries the newest state.

use std::time::{Duration, Instant};

/// Default spacing between accepted sends.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Remembers only the time of the last accepted send.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_send: Option<Instant>,
}

impl RateLimiter {
    /// Creates a limiter with the default 100 ms interval.
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_MIN_INTERVAL)
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_send: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Returns `true` and records `now` iff at least `min_interval` has
    /// elapsed since the last accepted send.  The first call always admits.
    ///
    /// A `now` earlier than the last accepted send is treated as zero elapsed
    /// time.
    pub fn admit(&mut self, now: Instant) -> bool {
        let allowed = match self.last_send {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if allowed {
            self.last_send = Some(now);
        }
        allowed
    }

    /// Forgets the last send so the next call to [`admit`](Self::admit)
    /// succeeds.  Used when a fresh link comes up.
    pub fn reset(&mut self) {
        self.last_send = None;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
