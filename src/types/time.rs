//! Wraparound-safe monotonic time
//!
//! The board clock is a `u32` millisecond counter that wraps after ~49.7
//! days. All comparisons go through wrapping differences so a prop left
//! running for weeks keeps debouncing and timing windows correctly.

use serde::{Deserialize, Serialize};

/// Milliseconds since boot, wrapping at `u32::MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Millis(pub u32);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    /// Milliseconds elapsed from `earlier` to `self`, across a wrap
    pub fn elapsed_since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    pub fn wrapping_add(self, ms: u32) -> Millis {
        Millis(self.0.wrapping_add(ms))
    }

    /// True once `self` is at or past `deadline`.
    ///
    /// Only valid while the two are less than half the counter range apart,
    /// which is why [`TimedWindow`] clears its deadline once it has passed.
    pub fn has_reached(self, deadline: Millis) -> bool {
        (self.0.wrapping_sub(deadline.0) as i32) >= 0
    }

    pub fn as_u64(self) -> u64 {
        u64::from(self.0)
    }
}

impl std::fmt::Display for Millis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A fixed-duration window that is either inactive or open until a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimedWindow {
    until: Option<Millis>,
}

impl TimedWindow {
    pub fn inactive() -> Self {
        Self { until: None }
    }

    /// (Re)open the window for `duration_ms` from `now`
    pub fn start(&mut self, now: Millis, duration_ms: u32) {
        self.until = Some(now.wrapping_add(duration_ms));
    }

    /// Check the window, clearing it once its deadline has passed
    pub fn poll(&mut self, now: Millis) -> bool {
        match self.until {
            Some(until) if now.has_reached(until) => {
                self.until = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Side-effect free variant of [`poll`](Self::poll)
    pub fn is_active(&self, now: Millis) -> bool {
        matches!(self.until, Some(until) if !now.has_reached(until))
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.until
    }
}

/// Gates a repeated attempt to at most once per interval.
///
/// The first attempt is always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimer {
    interval_ms: u32,
    last_attempt: Option<Millis>,
}

impl RetryTimer {
    pub fn new(interval_ms: u32) -> Self {
        Self { interval_ms, last_attempt: None }
    }

    /// Returns true (and records the attempt) if an attempt may be made now
    pub fn try_attempt(&mut self, now: Millis) -> bool {
        let ready = match self.last_attempt {
            None => true,
            Some(last) => now.elapsed_since(last) >= self.interval_ms,
        };
        if ready {
            self.last_attempt = Some(now);
        }
        ready
    }

    pub fn last_attempt(&self) -> Option<Millis> {
        self.last_attempt
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}

/// Contact debouncer: a reading is accepted only after it has stayed
/// unchanged for the whole window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    last_raw: bool,
    last_change: Millis,
}

impl Debouncer {
    /// Seed from an immediate read
    pub fn new(raw: bool, now: Millis) -> Self {
        Self { last_raw: raw, last_change: now }
    }

    /// Feed one raw sample.
    ///
    /// A changed sample restarts the window and yields `None` for this call.
    /// An unchanged sample yields `Some(raw)` once the window has elapsed.
    pub fn observe(&mut self, raw: bool, now: Millis, window_ms: u32) -> Option<bool> {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change = now;
            return None;
        }
        if now.elapsed_since(self.last_change) < window_ms {
            return None;
        }
        Some(raw)
    }

    pub fn last_raw(&self) -> bool {
        self.last_raw
    }

    pub fn last_change(&self) -> Millis {
        self.last_change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_across_wrap() {
        let before = Millis(u32::MAX - 5);
        let after = before.wrapping_add(10);
        assert_eq!(after, Millis(4));
        assert_eq!(after.elapsed_since(before), 10);
    }

    #[test]
    fn deadline_across_wrap() {
        let now = Millis(u32::MAX - 100);
        let deadline = now.wrapping_add(2000);
        assert!(!now.has_reached(deadline));
        assert!(!now.wrapping_add(1999).has_reached(deadline));
        assert!(now.wrapping_add(2000).has_reached(deadline));
    }

    #[test]
    fn window_clears_after_deadline() {
        let mut w = TimedWindow::inactive();
        assert!(!w.poll(Millis(0)));

        w.start(Millis(100), 50);
        assert!(w.poll(Millis(149)));
        assert!(!w.poll(Millis(150)));
        assert_eq!(w.deadline(), None);
    }

    #[test]
    fn retry_timer_spacing() {
        let mut t = RetryTimer::new(3000);
        assert!(t.try_attempt(Millis(0)));
        assert!(!t.try_attempt(Millis(2999)));
        assert!(t.try_attempt(Millis(3000)));
        assert!(!t.try_attempt(Millis(3001)));
    }

    #[test]
    fn debouncer_requires_stable_window() {
        let mut d = Debouncer::new(false, Millis(0));
        assert_eq!(d.observe(false, Millis(5), 20), None);
        assert_eq!(d.observe(false, Millis(20), 20), Some(false));

        // change restarts the window
        assert_eq!(d.observe(true, Millis(30), 20), None);
        assert_eq!(d.observe(true, Millis(49), 20), None);
        assert_eq!(d.observe(true, Millis(50), 20), Some(true));
    }
}
