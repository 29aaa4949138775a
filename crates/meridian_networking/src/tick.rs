//! # Fixed-Timestep Tick Loop
//!
//! Paces the headless simulation in real time. The simulation itself only
//! sees the fixed delta, so a slow tick never changes its outcome; it just
//! makes the loop run owed ticks back to back.
//!
//! ```text
//!  wall clock ──► owed time ──► while owed >= budget { step(); owed -= budget }
//!                                   │
//!                                   └── sleep / spin until the next budget
//! ```

use std::time::{Duration, Instant};

use crate::config::DEFAULT_TICK_RATE;

/// Sleeping closer than this to the deadline risks oversleeping.
const SPIN_MARGIN: Duration = Duration::from_micros(500);

/// Fixed-timestep pacing controller.
#[derive(Debug)]
pub struct TickLoop {
    budget: Duration,
    last_poll: Instant,
    owed: Duration,
    ticks: u64,
    stats: TickStats,
}

/// Wall-clock cost of executed ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Fastest tick in microseconds.
    pub min_tick_us: u64,
    /// Slowest tick in microseconds.
    pub max_tick_us: u64,
    /// Exponential moving average in microseconds.
    pub avg_tick_us: u64,
    /// Ticks that took longer than the budget.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn empty(budget: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            avg_tick_us: micros(budget),
            ..Self::default()
        }
    }

    fn record(&mut self, us: u64) {
        self.total_ticks += 1;
        self.min_tick_us = self.min_tick_us.min(us);
        self.max_tick_us = self.max_tick_us.max(us);
        self.avg_tick_us = (self.avg_tick_us * 15 + us) / 16;
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl TickLoop {
    /// Creates a loop running `tick_rate` ticks per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let budget = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            budget,
            last_poll: Instant::now(),
            owed: Duration::ZERO,
            ticks: 0,
            stats: TickStats::empty(budget),
        }
    }

    /// Returns `true` while at least one tick is owed.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.owed += now.duration_since(self.last_poll);
        self.last_poll = now;
        self.owed >= self.budget
    }

    /// Pays off one owed tick and returns its start time.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.owed = self.owed.saturating_sub(self.budget);
        self.ticks += 1;
        Instant::now()
    }

    /// Records the cost of the tick started at `start`.
    pub fn end_tick(&mut self, start: Instant) {
        let took = start.elapsed();
        let us = micros(took);
        self.stats.record(us);
        if took > self.budget {
            self.stats.late_ticks += 1;
            tracing::debug!(tick = self.ticks, us, "late tick");
        }
    }

    /// Blocks until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let Some(remaining) = self.budget.checked_sub(self.last_poll.elapsed()) else {
            return;
        };
        if remaining > SPIN_MARGIN * 2 {
            std::thread::sleep(remaining - SPIN_MARGIN);
        }
        while self.last_poll.elapsed() < self.budget {
            std::hint::spin_loop();
        }
    }

    /// Runs `step` exactly `ticks` times at the configured rate.
    ///
    /// `step` receives the tick number, starting at 1.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error from `step`.
    pub fn run<E>(&mut self, ticks: u64, mut step: impl FnMut(u64) -> Result<(), E>) -> Result<(), E> {
        let target = self.ticks + ticks;
        while self.ticks < target {
            while self.ticks < target && self.should_tick() {
                let start = self.begin_tick();
                step(self.ticks)?;
                self.end_tick(start);
            }
            if self.ticks < target {
                self.wait_for_next_tick();
            }
        }
        Ok(())
    }

    /// Ticks begun so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Wall-clock budget per tick.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.budget
    }

    /// Fixed delta handed to the simulation, in milliseconds.
    #[must_use]
    pub fn delta_ms(&self) -> f64 {
        self.budget.as_secs_f64() * 1000.0
    }

    /// Clears timing statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::empty(self.budget);
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}
