//! Background generation calculator.
//!
//! One dedicated thread per run: pull a ticket, copy the base generation,
//! apply the rule, store the result. Self-throttling through the buffer's
//! lookahead bound; the only sleeps are short fixed backoffs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use super::ring::GenerationRing;
use crate::rules::RuleEngine;

pub const WORKER_THREAD_NAME: &str = "generation-calculation";

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn calculation thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// How a stop request ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// No worker was running.
    Idle,
    /// The worker observed the stop flag and was joined.
    Joined,
    /// The worker did not exit within the timeout and was detached.
    TimedOut,
}

/// Flags and counters shared between the coordinator and the worker thread.
#[derive(Debug)]
pub struct WorkerShared {
    /// Cleared to park the worker without stopping it.
    pub running: AtomicBool,
    /// Birth rule toggle, read once per computed generation.
    pub allow_birth: AtomicBool,
    /// Generations computed since the last [`WorkerShared::take_calculated`].
    calculated: AtomicU64,
    /// Generations computed over the worker's lifetime.
    total: AtomicU64,
}

impl Default for WorkerShared {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            allow_birth: AtomicBool::new(true),
            calculated: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }
}

impl WorkerShared {
    /// Drain the throughput counter.
    pub fn take_calculated(&self) -> u64 {
        self.calculated.swap(0, Ordering::AcqRel)
    }

    pub fn total_calculated(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    fn record(&self) {
        self.calculated.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::AcqRel);
    }
}

/// Worker loop timing.
#[derive(Clone, Copy, Debug)]
pub struct WorkerTiming {
    pub idle_sleep: Duration,
    pub backoff_sleep: Duration,
}

/// Owner of the calculation thread.
pub struct CalculationWorker {
    shared: Arc<WorkerShared>,
    timing: WorkerTiming,
    handle: Option<RunningWorker>,
}

struct RunningWorker {
    stop: Arc<AtomicBool>,
    /// Disconnects when the thread exits, panicking or not.
    exited: mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

impl CalculationWorker {
    pub fn new(shared: Arc<WorkerShared>, timing: WorkerTiming) -> Self {
        Self {
            shared,
            timing,
            handle: None,
        }
    }

    pub fn shared(&self) -> &Arc<WorkerShared> {
        &self.shared
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|running| !running.thread.is_finished())
    }

    /// Spawn the calculation thread. A no-op if one is already running.
    pub fn start(
        &mut self,
        ring: Arc<GenerationRing>,
        engine: Arc<RuleEngine>,
    ) -> Result<(), WorkerError> {
        if self.is_active() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let timing = self.timing;
        let thread_stop = Arc::clone(&stop);
        let epoch = ring.epoch();

        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _exit_guard = exit_tx;
                calculation_loop(&ring, epoch, &engine, &shared, &thread_stop, timing);
            })?;

        log::debug!("calculation worker spawned");
        self.handle = Some(RunningWorker {
            stop,
            exited,
            thread,
        });
        Ok(())
    }

    /// Signal the worker to exit and wait up to `timeout` for it.
    ///
    /// On timeout the thread is detached; its stale tickets are rejected by
    /// the buffer after the next reset.
    pub fn stop(&mut self, timeout: Duration) -> Shutdown {
        let Some(running) = self.handle.take() else {
            return Shutdown::Idle;
        };
        running.stop.store(true, Ordering::Release);

        match running.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if running.thread.join().is_err() {
                    log::warn!("calculation worker panicked before stopping");
                }
                log::debug!("calculation worker joined");
                Shutdown::Joined
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "calculation worker did not stop within {} ms, detaching",
                    timeout.as_millis()
                );
                Shutdown::TimedOut
            }
        }
    }
}

/// Produce generations for the buffer epoch the worker was started in.
/// Exits early once the buffer has been reset under it.
fn calculation_loop(
    ring: &GenerationRing,
    epoch: u64,
    engine: &RuleEngine,
    shared: &WorkerShared,
    stop: &AtomicBool,
    timing: WorkerTiming,
) {
    while !stop.load(Ordering::Acquire) {
        if !shared.running.load(Ordering::Acquire) {
            thread::sleep(timing.idle_sleep);
            continue;
        }

        let Some(ticket) = ring.try_next_in_epoch(epoch) else {
            if ring.epoch() != epoch {
                log::debug!("calculation worker outlived its buffer epoch, exiting");
                break;
            }
            thread::sleep(timing.backoff_sleep);
            continue;
        };

        let base = ring.base_for_calculation(ticket.slot);
        let allow_birth = shared.allow_birth.load(Ordering::Acquire);
        let next = engine.next(&base, allow_birth);

        if ring.save_calculated(ticket, next) {
            shared.record();
        } else {
            log::trace!(
                "dropped generation {} computed for a reset buffer",
                ticket.generation
            );
        }
    }
}
