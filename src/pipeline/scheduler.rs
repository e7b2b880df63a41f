//! Fixed-rate playback of buffered generations.
//!
//! Driven by an external frame clock: every tick catches up on display
//! deadlines that have passed, but only with generations the buffer already
//! holds. The display rate is therefore capped by calculation throughput,
//! and a tick never waits for the worker.

use std::time::{Duration, Instant};

use super::ring::GenerationRing;

/// Lower bound on catch-up iterations per tick.
const MIN_CATCH_UP: u32 = 16;

/// Outcome of a single [`PlaybackScheduler::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Generations shown during this tick.
    pub shown: u32,
    /// Displayed generation number after the tick.
    pub last_generation: u64,
    /// Haptic pulses requested (one per shown generation at slow rates).
    pub pulses: u32,
    /// A deadline passed but the next generation was not computed yet.
    pub starved: bool,
}

impl TickReport {
    /// Generation numbers shown during the tick, in display order.
    pub fn shown_generations(&self) -> impl Iterator<Item = u64> + use<> {
        let first = self.last_generation + 1 - self.shown as u64;
        first..=self.last_generation
    }
}

pub struct PlaybackScheduler {
    gen_per_sec: u32,
    vibrate_every_gen: bool,
    next_due: Option<Instant>,
    displayed: u64,
}

impl PlaybackScheduler {
    pub fn new(gen_per_sec: u32, vibrate_every_gen: bool) -> Self {
        Self {
            gen_per_sec: gen_per_sec.max(1),
            vibrate_every_gen,
            next_due: None,
            displayed: 0,
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.gen_per_sec
    }

    pub fn gen_per_sec(&self) -> u32 {
        self.gen_per_sec
    }

    pub fn displayed_count(&self) -> u64 {
        self.displayed
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn set_vibrate_every_gen(&mut self, enabled: bool) {
        self.vibrate_every_gen = enabled;
    }

    /// Begin a run: counter back to 0, first deadline one interval from `now`.
    pub fn start(&mut self, now: Instant) {
        self.displayed = 0;
        self.next_due = Some(now + self.interval());
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Change the rate. While active the deadline is re-anchored to
    /// `now + interval`; missed ticks are not replayed at the new rate.
    pub fn set_rate(&mut self, gen_per_sec: u32, now: Instant) {
        self.gen_per_sec = gen_per_sec.max(1);
        if self.next_due.is_some() {
            self.next_due = Some(now + self.interval());
        }
    }

    /// Adopt `displayed` after an out-of-band jump (skip to latest).
    pub fn resync(&mut self, displayed: u64, now: Instant) {
        self.displayed = displayed;
        if self.next_due.is_some() {
            self.next_due = Some(now + self.interval());
        }
    }

    fn catch_up_limit(&self) -> u32 {
        MIN_CATCH_UP.max(self.gen_per_sec.saturating_mul(2))
    }

    pub fn tick(&mut self, now: Instant, ring: &GenerationRing) -> TickReport {
        let mut report = TickReport {
            last_generation: self.displayed,
            ..TickReport::default()
        };
        let Some(mut due) = self.next_due else {
            return report;
        };

        let interval = self.interval();
        let pulse = self.vibrate_every_gen && self.gen_per_sec <= 1;
        let mut budget = self.catch_up_limit();

        while now >= due && budget > 0 {
            budget -= 1;
            if !ring.try_display(self.displayed + 1) {
                report.starved = true;
                break;
            }
            self.displayed += 1;
            due += interval;
            report.shown += 1;
            if pulse {
                report.pulses += 1;
            }
        }

        self.next_due = Some(due);
        report.last_generation = self.displayed;
        report
    }
}
