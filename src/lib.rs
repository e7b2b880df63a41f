//! Buffered Conway's Game of Life (B3/S23) on an unbounded sparse grid.
//!
//! Generations are calculated on a background thread into a fixed ring of
//! slots while playback consumes them at a configurable rate.

pub mod cell;
pub mod config;
pub mod grid;
pub mod pattern;
pub mod pipeline;
pub mod rules;
pub mod snapshot;

pub use cell::{Cell, CellSet};
pub use config::SimulationConfig;
pub use grid::GridState;
pub use pattern::{PatternData, PatternError, PatternLibrary};
pub use pipeline::{
    GenerationRing, PlaybackListener, RingView, Shutdown, SimState, Simulation, TickReport,
};
pub use rules::RuleEngine;
pub use snapshot::{Snapshot, SnapshotError};
