//! One-shot expiry timer for a single field
//!
//! The timer holds a deadline rather than a callback. Its owner asks
//! [`StalenessTimer::fire`] on every pass of its loop and applies the reset
//! itself, so expiry goes through the same writer as fresh updates.

/// One-shot countdown keyed to a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessTimer {
    window_ms: u64,
    deadline_ms: Option<u64>,
}

impl StalenessTimer {
    /// Create a disarmed timer with a fixed window
    pub const fn new(window_ms: u32) -> Self {
        Self {
            window_ms: window_ms as u64,
            deadline_ms: None,
        }
    }

    /// (Re)start the countdown from `now_ms`
    ///
    /// Any pending fire is cancelled first.
    pub fn arm(&mut self, now_ms: u64) {
        self.cancel();
        self.deadline_ms = Some(now_ms + self.window_ms);
    }

    /// Disarm without firing
    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    /// Returns true exactly once when the deadline has passed
    ///
    /// Firing disarms the timer.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}
