//! Generation rule engine for B3/S23 on a sparse cell set.
//!
//! Work is bounded by the live population: every live cell contributes its
//! 3x3 block to the candidate set, and only candidates are evaluated.
//! Births can be suppressed per call, which turns the rule into pure S23.
//!
//! Candidate evaluation optionally fans out over a private rayon pool for
//! large populations. Output is a set, so the result does not depend on the
//! thread count.

use rayon::prelude::*;

use crate::cell::{Cell, CellSet, cell_set_with_capacity};

/// Below this many candidates, evaluation stays serial even with a pool.
const PARALLEL_MIN_CANDIDATES: usize = 16_384;
/// Candidates handed to one rayon task.
const PARALLEL_CHUNK: usize = 2_048;

/// Count live neighbors of `cell` in `alive` (the cell itself excluded).
#[inline]
pub fn live_neighbors(alive: &CellSet, cell: Cell) -> u8 {
    cell.neighbors().filter(|n| alive.contains(n)).count() as u8
}

/// Rule outcome for a single cell.
#[inline(always)]
pub fn next_state(alive: bool, neighbors: u8, allow_birth: bool) -> bool {
    match (alive, neighbors) {
        (true, 2) | (true, 3) => true,
        (false, 3) => allow_birth,
        _ => false,
    }
}

/// Every live cell plus its 8 neighbors.
pub fn candidates(alive: &CellSet) -> CellSet {
    let mut out = cell_set_with_capacity(alive.len().saturating_mul(4));
    for &cell in alive {
        for dy in -1..=1 {
            for dx in -1..=1 {
                out.insert(cell.offset(dx, dy));
            }
        }
    }
    out
}

/// Compute the generation following `alive`. Never mutates the input.
///
/// With `allow_birth == false` the output is always a subset of the input.
pub fn next_generation(alive: &CellSet, allow_birth: bool) -> CellSet {
    if !allow_birth {
        // Only current cells can survive, so the candidate pass is unnecessary.
        return alive
            .iter()
            .copied()
            .filter(|&cell| next_state(true, live_neighbors(alive, cell), false))
            .collect();
    }

    let candidates = candidates(alive);
    let mut next = cell_set_with_capacity(alive.len());
    for cell in candidates {
        if next_state(alive.contains(&cell), live_neighbors(alive, cell), true) {
            next.insert(cell);
        }
    }
    next
}

fn next_generation_parallel(alive: &CellSet, allow_birth: bool) -> CellSet {
    let candidates: Vec<Cell> = if allow_birth {
        candidates(alive).into_iter().collect()
    } else {
        alive.iter().copied().collect()
    };

    candidates
        .par_chunks(PARALLEL_CHUNK)
        .map(|chunk| {
            chunk
                .iter()
                .copied()
                .filter(|&cell| {
                    next_state(
                        alive.contains(&cell),
                        live_neighbors(alive, cell),
                        allow_birth,
                    )
                })
                .collect::<Vec<Cell>>()
        })
        .reduce(Vec::new, |mut acc, mut part| {
            acc.append(&mut part);
            acc
        })
        .into_iter()
        .collect()
}

/// Rule engine with an optional compute pool.
///
/// `threads == 1` keeps everything on the calling thread, which is the
/// calculation worker in a running simulation.
pub struct RuleEngine {
    pool: Option<rayon::ThreadPool>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    /// Serial engine.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Engine with `threads` compute threads. `0` means one per physical core.
    ///
    /// Falls back to serial evaluation if the pool cannot be built.
    pub fn with_threads(threads: usize) -> Self {
        let threads = if threads == 0 {
            num_cpus::get_physical().max(1)
        } else {
            threads
        };
        if threads == 1 {
            return Self::new();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("life-rules-{i}"))
            .build();
        match pool {
            Ok(pool) => Self { pool: Some(pool) },
            Err(err) => {
                log::warn!("rule engine pool unavailable ({err}), evaluating serially");
                Self::new()
            }
        }
    }

    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, rayon::ThreadPool::current_num_threads)
    }

    pub fn next(&self, alive: &CellSet, allow_birth: bool) -> CellSet {
        match &self.pool {
            Some(pool) if alive.len().saturating_mul(9) >= PARALLEL_MIN_CANDIDATES => {
                pool.install(|| next_generation_parallel(alive, allow_birth))
            }
            _ => next_generation(alive, allow_birth),
        }
    }
}
