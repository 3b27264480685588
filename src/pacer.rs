//! Holds a loop to a fixed tick rate.

use std::time::{Duration, Instant};

/// Sleeps away whatever is left of each tick once its work is done.
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    tick_start: Instant,
}

impl Pacer {
    /// A pacer for `rate` ticks per second
    pub fn new(rate: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / rate),
            tick_start: Instant::now(),
        }
    }

    /// Length of one tick
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Mark the beginning of a tick.
    pub fn start(&mut self) {
        self.tick_start = Instant::now();
    }

    /// Time left in the current tick
    pub fn remaining(&self) -> Duration {
        self.period.saturating_sub(self.tick_start.elapsed())
    }

    /// Sleep until the current tick is over. Returns immediately when the
    /// tick already overran.
    pub fn wait(&self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            spin_sleep::sleep(remaining);
        }
    }
}
