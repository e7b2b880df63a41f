//! Run/pause/reset coordinator tying the buffer, worker and scheduler together.
//!
//! Owns the only calculation worker. The host application calls [`Simulation::tick`]
//! once per frame; everything else is an explicit command.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use rand::Rng;

use super::ring::{GenerationRing, RingView};
use super::scheduler::{PlaybackScheduler, TickReport};
use super::worker::{CalculationWorker, Shutdown, WorkerError, WorkerShared, WorkerTiming};
use crate::cell::{Cell, CellSet};
use crate::config::SimulationConfig;
use crate::pattern::{PatternData, PatternError};
use crate::rules::RuleEngine;
use crate::snapshot::Snapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimState {
    Idle,
    Running,
}

/// Callbacks into the presentation layer. All methods default to no-ops.
pub trait PlaybackListener: Send {
    fn on_generation_displayed(&mut self, _generation: u64) {}
    fn on_haptic_pulse(&mut self) {}
    fn on_generations_per_second(&mut self, _gps: u64) {}
    fn on_state_changed(&mut self, _state: SimState) {}
}

#[derive(Default)]
struct Throughput {
    sample_start: Option<Instant>,
    per_second: u64,
}

pub struct Simulation {
    config: SimulationConfig,
    ring: Arc<GenerationRing>,
    engine: Arc<RuleEngine>,
    worker: CalculationWorker,
    scheduler: PlaybackScheduler,
    state: SimState,
    listener: Option<Box<dyn PlaybackListener>>,
    throughput: Throughput,
    last_shutdown: Shutdown,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let ring = Arc::new(GenerationRing::from_config(&config));
        let engine = Arc::new(RuleEngine::with_threads(config.rule_threads));
        let timing = WorkerTiming {
            idle_sleep: config.idle_sleep,
            backoff_sleep: config.backoff_sleep,
        };
        let worker = CalculationWorker::new(Arc::new(WorkerShared::default()), timing);
        let scheduler = PlaybackScheduler::new(config.gen_per_sec, config.vibrate_every_gen);

        Self {
            config,
            ring,
            engine,
            worker,
            scheduler,
            state: SimState::Idle,
            listener: None,
            throughput: Throughput::default(),
            last_shutdown: Shutdown::Idle,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Read-only view of the generation buffer, for renderers that poll it
    /// directly. Grid edits go through the simulation.
    pub fn ring(&self) -> RingView<'_> {
        RingView::new(&self.ring)
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SimState::Running
    }

    pub fn set_listener(&mut self, listener: Box<dyn PlaybackListener>) {
        self.listener = Some(listener);
    }

    fn set_state(&mut self, state: SimState) {
        if self.state == state {
            return;
        }
        self.state = state;
        if let Some(listener) = self.listener.as_mut() {
            listener.on_state_changed(state);
        }
    }

    // Grid edits. Rejected while running.

    pub fn is_alive(&self, cell: Cell) -> bool {
        self.ring.is_alive(cell)
    }

    /// Returns `false` (no change) while running.
    pub fn set_alive(&self, cell: Cell, alive: bool) -> bool {
        if self.is_running() {
            return false;
        }
        self.ring.set_alive(cell, alive);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn population(&self) -> usize {
        self.ring.population()
    }

    pub fn living_cells(&self) -> CellSet {
        self.ring.living_cells()
    }

    pub fn has_state_changed(&self) -> bool {
        self.ring.has_state_changed()
    }

    pub fn reset_state_change(&self) {
        self.ring.reset_state_change();
    }

    /// Random soup in a `width` x `height` block. Rejected while running.
    pub fn randomize<R: Rng>(&self, width: i32, height: i32, density: f64, rng: &mut R) -> bool {
        if self.is_running() {
            return false;
        }
        self.ring
            .edit_grid(|grid| grid.randomize(width, height, density, rng));
        true
    }

    // Birth rule and playback knobs.

    pub fn allow_birth(&self) -> bool {
        self.worker.shared().allow_birth.load(Ordering::Acquire)
    }

    /// Takes effect from the next computed generation.
    pub fn set_allow_birth(&self, allow: bool) {
        self.worker
            .shared()
            .allow_birth
            .store(allow, Ordering::Release);
    }

    pub fn gen_per_sec(&self) -> u32 {
        self.scheduler.gen_per_sec()
    }

    pub fn set_speed(&mut self, gen_per_sec: u32, now: Instant) {
        self.scheduler.set_rate(gen_per_sec, now);
        self.config.gen_per_sec = self.scheduler.gen_per_sec();
    }

    pub fn set_vibrate_every_gen(&mut self, enabled: bool) {
        self.config.vibrate_every_gen = enabled;
        self.scheduler.set_vibrate_every_gen(enabled);
    }

    // State machine.

    /// Idle -> Running. Returns `Ok(false)` without starting when the grid is empty.
    pub fn run(&mut self, now: Instant) -> Result<bool, WorkerError> {
        if self.is_running() {
            return Ok(true);
        }
        if self.ring.is_empty() {
            log::debug!("run ignored: grid is empty");
            return Ok(false);
        }

        self.ring.reset();
        self.scheduler.start(now);
        self.throughput = Throughput::default();

        let shared = Arc::clone(self.worker.shared());
        shared.take_calculated();
        shared.running.store(true, Ordering::Release);
        if let Err(err) = self
            .worker
            .start(Arc::clone(&self.ring), Arc::clone(&self.engine))
        {
            shared.running.store(false, Ordering::Release);
            self.scheduler.stop();
            return Err(err);
        }

        log::info!(
            "simulation running: {} cells at {} gen/s",
            self.ring.population(),
            self.scheduler.gen_per_sec()
        );
        self.set_state(SimState::Running);
        Ok(true)
    }

    /// Running -> Idle. Stops and joins the worker; the display keeps the
    /// last shown generation.
    pub fn pause(&mut self) -> Shutdown {
        self.worker
            .shared()
            .running
            .store(false, Ordering::Release);
        self.scheduler.stop();
        let shutdown = self.worker.stop(self.config.join_timeout);
        if shutdown != Shutdown::Idle {
            self.last_shutdown = shutdown;
        }
        if self.is_running() {
            log::info!(
                "simulation paused at generation {}",
                self.scheduler.displayed_count()
            );
        }
        self.set_state(SimState::Idle);
        shutdown
    }

    pub fn toggle(&mut self, now: Instant) -> Result<SimState, WorkerError> {
        if self.is_running() {
            self.pause();
        } else {
            self.run(now)?;
        }
        Ok(self.state)
    }

    /// Any state -> Idle with an empty grid and buffer.
    pub fn reset(&mut self) {
        self.pause();
        self.ring.clear_grid();
        log::info!("simulation reset");
    }

    /// Outcome of the most recent worker shutdown.
    pub fn last_shutdown(&self) -> Shutdown {
        self.last_shutdown
    }

    /// Advance playback to `now`. Call once per frame.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        if !self.is_running() {
            return TickReport {
                last_generation: self.scheduler.displayed_count(),
                ..TickReport::default()
            };
        }

        let report = self.scheduler.tick(now, &self.ring);
        if let Some(listener) = self.listener.as_mut() {
            for generation in report.shown_generations() {
                listener.on_generation_displayed(generation);
            }
            for _ in 0..report.pulses {
                listener.on_haptic_pulse();
            }
        }
        self.sample_throughput(now);
        report
    }

    fn sample_throughput(&mut self, now: Instant) {
        let Some(start) = self.throughput.sample_start else {
            self.throughput.sample_start = Some(now);
            return;
        };
        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.config.stats_interval || elapsed.is_zero() {
            return;
        }

        let calculated = self.worker.shared().take_calculated();
        let per_second = (calculated as f64 / elapsed.as_secs_f64()).round() as u64;
        self.throughput.per_second = per_second;
        self.throughput.sample_start = Some(now);
        log::debug!(
            "{per_second} gen/s calculated, lookahead {}",
            self.ring.lookahead()
        );
        if let Some(listener) = self.listener.as_mut() {
            listener.on_generations_per_second(per_second);
        }
    }

    /// Most recent calculation throughput sample.
    pub fn generations_per_second(&self) -> u64 {
        self.throughput.per_second
    }

    pub fn total_calculated(&self) -> u64 {
        self.worker.shared().total_calculated()
    }

    /// Generations displayed since the run started.
    pub fn displayed_generation(&self) -> u64 {
        self.scheduler.displayed_count()
    }

    /// Jump to the newest computed generation. Returns `false` while idle or
    /// if none is ahead of the display.
    pub fn skip_to_latest(&mut self, now: Instant) -> bool {
        if !self.is_running() || !self.ring.switch_to_latest() {
            return false;
        }
        let displayed = self.ring.displayed_generation();
        self.scheduler.resync(displayed, now);
        if let Some(listener) = self.listener.as_mut() {
            listener.on_generation_displayed(displayed);
        }
        true
    }

    // Save / load / patterns. All pause or refuse while running.

    /// Copy the grid into the save slot. Refused while running.
    pub fn save(&self) -> bool {
        if self.is_running() {
            return false;
        }
        self.ring.save_grid();
        true
    }

    /// Restore the save slot. Refused while running or when nothing was saved.
    pub fn load(&self) -> bool {
        if self.is_running() {
            return false;
        }
        self.ring.load_grid()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_cells(&self.ring.living_cells())
    }

    /// Replace the grid with `snapshot`. Refused while running.
    pub fn restore(&self, snapshot: &Snapshot) -> bool {
        if self.is_running() {
            return false;
        }
        self.ring.set_pattern(snapshot.to_cells());
        true
    }

    /// Pause and replace the grid with `cells`.
    pub fn load_cells(&mut self, cells: CellSet) {
        self.pause();
        let count = cells.len();
        self.ring.set_pattern(cells);
        log::debug!("grid replaced with {count} cells");
    }

    /// Pause and replace the grid with a decoded library pattern.
    pub fn load_pattern(&mut self, pattern: &PatternData) -> Result<usize, PatternError> {
        let cells = pattern.to_cells()?;
        let count = cells.len();
        self.load_cells(cells);
        log::info!(
            "loaded pattern '{}' (id {}) with {count} cells",
            pattern.name,
            pattern.id
        );
        Ok(count)
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.pause();
    }
}
