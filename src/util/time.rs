//! Time utilities for game simulation
//!
//! The simulation never reads the wall clock; every time-based rule (collision
//! debounce, serve delay, score timers) is expressed in simulated ticks.

use std::time::Duration;

/// Tick counter with a fixed tick length
#[derive(Debug, Clone)]
pub struct SimClock {
    tick: u64,
    tick_rate: u32,
}

impl SimClock {
    pub fn new(tick_rate: u32) -> Self {
        debug_assert!(tick_rate > 0, "tick rate must be positive");
        Self {
            tick: 0,
            tick_rate,
        }
    }

    /// Advance one tick and return the new tick number
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated milliseconds since the clock started
    pub fn now_millis(&self) -> u64 {
        self.tick * 1000 / self.tick_rate as u64
    }

    /// Number of whole ticks that cover `duration`
    pub fn ticks_for(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.tick_rate as f64).ceil() as u64
    }

    pub fn reset(&mut self) {
        self.tick = 0;
    }
}
