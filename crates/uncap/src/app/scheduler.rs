use std::time::{Duration, Instant};

use crate::config::{RateDivisor, UncapConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    pub elapsed: Duration,
    pub owed_ticks: f64,
    pub runaway_reset: bool,
    pub dropped_ticks: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Accumulation {
    accumulator: f64,
    dropped_ticks: f64,
}

fn accumulate(accumulator: f64, owed_ticks: f64, runaway_ceiling: f64) -> Accumulation {
    let total = accumulator + owed_ticks;
    if total > runaway_ceiling {
        Accumulation {
            accumulator: 0.0,
            dropped_ticks: total,
        }
    } else {
        Accumulation {
            accumulator: total,
            dropped_ticks: 0.0,
        }
    }
}

/// Converts wall-clock time between render callbacks into whole logic ticks
/// at `logic_hz / divisor` ticks per second.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    logic_hz: u32,
    divisor: RateDivisor,
    runaway_ceiling: f64,
    accumulator: f64,
    last_sample: Instant,
}

impl TickScheduler {
    pub fn new(config: &UncapConfig, now: Instant) -> Self {
        Self {
            logic_hz: config.logic_hz.max(1),
            divisor: config.rate_divisor,
            runaway_ceiling: config.runaway_ceiling_ticks,
            accumulator: 0.0,
            last_sample: now,
        }
    }

    pub fn divisor(&self) -> RateDivisor {
        self.divisor
    }

    pub fn ticks_per_second(&self) -> f64 {
        f64::from(self.logic_hz) / f64::from(self.divisor.get())
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Fraction of the way from the last completed tick to the next one.
    pub fn progress(&self) -> f64 {
        self.accumulator.clamp(0.0, 1.0)
    }

    pub fn sample(&mut self, now: Instant) -> SampleOutcome {
        let elapsed = now.saturating_duration_since(self.last_sample);
        self.last_sample = now;

        let owed_ticks = elapsed.as_secs_f64() * self.ticks_per_second();
        let Accumulation {
            accumulator,
            dropped_ticks,
        } = accumulate(self.accumulator, owed_ticks, self.runaway_ceiling);
        self.accumulator = accumulator;

        SampleOutcome {
            elapsed,
            owed_ticks,
            runaway_reset: dropped_ticks > 0.0,
            dropped_ticks,
        }
    }

    pub fn tick_due(&self) -> bool {
        self.accumulator > 1.0
    }

    /// Claims one due tick. The accumulator is charged before the tick runs,
    /// so a rate change made from inside that tick leaves it at zero.
    pub fn take_due_tick(&mut self) -> bool {
        if !self.tick_due() {
            return false;
        }
        self.accumulator -= 1.0;
        true
    }

    pub fn set_rate_divisor(&mut self, divisor: RateDivisor, now: Instant) {
        self.divisor = divisor;
        self.accumulator = 0.0;
        self.last_sample = now;
    }
}
