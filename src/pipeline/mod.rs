//! Look-ahead generation pipeline.
//!
//! A [`CalculationWorker`] thread computes generations ahead of playback into
//! the [`GenerationRing`]; the [`PlaybackScheduler`] shows them at a fixed
//! rate from the frame loop. [`Simulation`] wires the pieces together.

pub mod ring;
pub mod scheduler;
pub mod simulation;
pub mod worker;

pub use ring::{CalcTicket, GenerationRing, RingStatus, RingView};
pub use scheduler::{PlaybackScheduler, TickReport};
pub use simulation::{PlaybackListener, SimState, Simulation};
pub use worker::{CalculationWorker, Shutdown, WorkerError, WorkerShared, WorkerTiming};
