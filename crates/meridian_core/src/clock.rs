//! # Tick Clock
//!
//! Monotonic simulation time accumulated from per-tick deltas.
//!
//! Cooldowns, phase durations, throttles, and subscription deadlines all
//! read this clock. It is sampled once per tick, so a tick observes a
//! single `now` no matter how long its systems take.

/// Monotonic tick-accumulated clock in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickClock {
    now: f64,
    delta: f64,
    frame: u64,
}

impl TickClock {
    /// Creates a clock at time zero, frame zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: 0.0,
            delta: 0.0,
            frame: 0,
        }
    }

    /// Advances by `delta_ms` and counts one frame.
    ///
    /// Negative or non-finite deltas are treated as zero, keeping the
    /// clock monotonic.
    pub fn advance(&mut self, delta_ms: f64) {
        let delta = if delta_ms.is_finite() && delta_ms > 0.0 {
            delta_ms
        } else {
            0.0
        };
        self.now += delta;
        self.delta = delta;
        self.frame += 1;
    }

    /// Current time in milliseconds.
    #[inline]
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Delta applied by the last [`advance`](Self::advance), in milliseconds.
    #[inline]
    #[must_use]
    pub const fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of ticks advanced.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Milliseconds elapsed since `since`.
    #[inline]
    #[must_use]
    pub fn elapsed_since(&self, since: f64) -> f64 {
        self.now - since
    }

    /// Returns `true` on every `interval`-th frame.
    #[inline]
    #[must_use]
    pub const fn every(&self, interval: u64) -> bool {
        interval != 0 && self.frame % interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let mut clock = TickClock::new();
        clock.advance(16.0);
        clock.advance(17.0);
        assert_eq!(clock.now(), 33.0);
        assert_eq!(clock.delta(), 17.0);
        assert_eq!(clock.frame(), 2);
        assert_eq!(clock.elapsed_since(16.0), 17.0);
    }

    #[test]
    fn test_bad_delta_keeps_clock_monotonic() {
        let mut clock = TickClock::new();
        clock.advance(10.0);
        clock.advance(-5.0);
        clock.advance(f64::NAN);
        assert_eq!(clock.now(), 10.0);
        assert_eq!(clock.frame(), 3);
    }

    #[test]
    fn test_every() {
        let mut clock = TickClock::new();
        let mut hits = 0;
        for _ in 0..120 {
            clock.advance(1.0);
            if clock.every(60) {
                hits += 1;
            }
        }
        assert_eq!(hits, 2);
        assert!(!clock.every(0));
    }
}
