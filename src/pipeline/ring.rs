//! Circular lookahead buffer of precomputed generations.
//!
//! Generation `n` always lives in slot `n % capacity`. The producer (the
//! calculation worker) may run at most `max_ahead` generations past the
//! displayed one; since `max_ahead < capacity`, a slot is never overwritten
//! while it is still needed as a calculation base or has not been shown.
//!
//! The buffer also owns the live grid, so the displayed set and every slot
//! sit behind one mutex. Every public method takes that lock itself and
//! returns owned copies; nothing borrowed escapes a critical section.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cell::{Cell, CellSet};
use crate::config::SimulationConfig;
use crate::grid::GridState;

/// Work item handed to the producer by [`GenerationRing::try_next_to_calculate`].
///
/// Carries the buffer epoch, so a ticket issued before a reset cannot
/// write into the reset buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalcTicket {
    pub slot: usize,
    pub generation: u64,
    epoch: u64,
}

/// Point-in-time view of the buffer cursors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingStatus {
    pub displayed_slot: usize,
    pub displayed_generation: u64,
    pub calculated_slot: usize,
    pub calculated_generation: u64,
    pub latest_ready_slot: Option<usize>,
}

impl RingStatus {
    pub fn lookahead(&self) -> u64 {
        self.calculated_generation
            .saturating_sub(self.displayed_generation)
    }
}

#[derive(Default)]
struct Slot {
    cells: CellSet,
    /// `None` = empty / unused.
    generation: Option<u64>,
}

struct RingState {
    grid: GridState,
    slots: Vec<Slot>,
    displayed_index: usize,
    displayed_number: u64,
    calculated_index: usize,
    calculated_number: u64,
    /// Next generation number to hand out.
    cursor: u64,
    /// Slot farthest ahead of the displayed one that is not yet displayed.
    latest_ready: Option<usize>,
    epoch: u64,
}

impl RingState {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot_of(&self, generation: u64) -> usize {
        (generation % self.capacity() as u64) as usize
    }

    /// Circular distance from the displayed slot to `slot`.
    #[inline]
    fn ahead_of_displayed(&self, slot: usize) -> usize {
        let cap = self.capacity();
        (slot + cap - self.displayed_index) % cap
    }

    fn show(&mut self, slot: usize, generation: u64) {
        let Self { grid, slots, .. } = self;
        grid.replace_from(&slots[slot].cells);
        self.displayed_index = slot;
        self.displayed_number = generation;
        self.settle_latest();
    }

    /// Drop the latest-ready pointer once it no longer points past the display.
    fn settle_latest(&mut self) {
        if let Some(i) = self.latest_ready {
            let stale = match self.slots[i].generation {
                Some(g) => g <= self.displayed_number,
                None => true,
            };
            if stale || i == self.displayed_index {
                self.latest_ready = None;
            }
        }
    }

    fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.cells.clear();
            slot.generation = None;
        }
        let seed = &mut self.slots[0];
        seed.cells.extend(self.grid.living().iter().copied());
        seed.generation = Some(0);

        self.displayed_index = 0;
        self.displayed_number = 0;
        self.calculated_index = 0;
        self.calculated_number = 0;
        self.cursor = 1;
        self.latest_ready = None;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Fixed-capacity generation buffer shared by the worker and the display loop.
pub struct GenerationRing {
    max_ahead: u64,
    state: Mutex<RingState>,
}

impl GenerationRing {
    /// Create an empty buffer. `capacity` is raised to at least 2 and
    /// `max_ahead` clamped to `1..capacity`.
    pub fn new(capacity: usize, max_ahead: u64) -> Self {
        let capacity = capacity.max(2);
        let max_ahead = max_ahead.clamp(1, capacity as u64 - 1);
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        let mut state = RingState {
            grid: GridState::new(),
            slots,
            displayed_index: 0,
            displayed_number: 0,
            calculated_index: 0,
            calculated_number: 0,
            cursor: 1,
            latest_ready: None,
            epoch: 0,
        };
        state.reset();
        Self {
            max_ahead,
            state: Mutex::new(state),
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.capacity, config.max_ahead)
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, RingState> {
        // Critical sections never leave the state half-written, so a panic
        // elsewhere while holding the lock does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn max_ahead(&self) -> u64 {
        self.max_ahead
    }

    /// Next slot and generation number to compute, or `None` while the
    /// producer is already `max_ahead` generations past the display.
    pub fn try_next_to_calculate(&self) -> Option<CalcTicket> {
        Self::next_ticket(&mut self.lock(), self.max_ahead)
    }

    /// Like [`GenerationRing::try_next_to_calculate`], but only while the
    /// buffer is still at `epoch`. A producer started before a reset gets
    /// nothing and leaves the cursor alone.
    pub(crate) fn try_next_in_epoch(&self, epoch: u64) -> Option<CalcTicket> {
        let mut s = self.lock();
        if s.epoch != epoch {
            return None;
        }
        Self::next_ticket(&mut s, self.max_ahead)
    }

    /// Current buffer epoch; bumped by every reset.
    pub(crate) fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    fn next_ticket(s: &mut RingState, max_ahead: u64) -> Option<CalcTicket> {
        let issued = s.cursor - 1;
        if issued.saturating_sub(s.displayed_number) >= max_ahead {
            return None;
        }
        let generation = s.cursor;
        let ticket = CalcTicket {
            slot: s.slot_of(generation),
            generation,
            epoch: s.epoch,
        };
        s.cursor += 1;
        Some(ticket)
    }

    /// Copy of the generation preceding `slot` (circular index - 1).
    ///
    /// Falls back to the live displayed set when the predecessor is the
    /// displayed slot or has never been written.
    pub fn base_for_calculation(&self, slot: usize) -> CellSet {
        let s = self.lock();
        let cap = s.capacity();
        let prev = (slot % cap + cap - 1) % cap;
        let buffered = &s.slots[prev];
        if prev == s.displayed_index || buffered.generation.is_none() {
            s.grid.living_cells()
        } else {
            buffered.cells.clone()
        }
    }

    /// Store a computed generation.
    ///
    /// Returns `false`, leaving the buffer untouched, for tickets from
    /// before the last reset.
    pub fn save_calculated(&self, ticket: CalcTicket, cells: CellSet) -> bool {
        let mut s = self.lock();
        if ticket.epoch != s.epoch || ticket.slot != s.slot_of(ticket.generation) {
            return false;
        }
        debug_assert_ne!(
            ticket.slot, s.displayed_index,
            "producer overwrote the displayed slot"
        );

        let slot = &mut s.slots[ticket.slot];
        slot.cells = cells;
        slot.generation = Some(ticket.generation);
        s.calculated_index = ticket.slot;
        s.calculated_number = ticket.generation;

        if ticket.slot != s.displayed_index {
            let latest = s.latest_ready;
            let farther = match latest {
                Some(current) => {
                    s.ahead_of_displayed(ticket.slot) > s.ahead_of_displayed(current)
                }
                None => true,
            };
            if farther {
                s.latest_ready = Some(ticket.slot);
            }
        }
        true
    }

    /// Show generation `desired` if it is newer than the displayed one and
    /// already computed. Never waits.
    pub fn try_display(&self, desired: u64) -> bool {
        let mut s = self.lock();
        if desired <= s.displayed_number {
            return false;
        }
        let slot = s.slot_of(desired);
        if s.slots[slot].generation != Some(desired) {
            return false;
        }
        s.show(slot, desired);
        true
    }

    /// Jump straight to the latest ready generation, skipping the ones in between.
    pub fn switch_to_latest(&self) -> bool {
        let mut s = self.lock();
        let Some(slot) = s.latest_ready.take() else {
            return false;
        };
        let tagged = s.slots[slot].generation;
        match tagged {
            Some(generation) if slot != s.displayed_index && generation > s.displayed_number => {
                s.show(slot, generation);
                true
            }
            _ => false,
        }
    }

    /// Clear every slot and reseed slot 0 from the live grid. All counters
    /// restart at generation 0.
    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn status(&self) -> RingStatus {
        let s = self.lock();
        RingStatus {
            displayed_slot: s.displayed_index,
            displayed_generation: s.displayed_number,
            calculated_slot: s.calculated_index,
            calculated_generation: s.calculated_number,
            latest_ready_slot: s.latest_ready,
        }
    }

    pub fn displayed_generation(&self) -> u64 {
        self.lock().displayed_number
    }

    pub fn calculated_generation(&self) -> u64 {
        self.lock().calculated_number
    }

    /// Generation number behind the latest-ready pointer.
    pub fn latest_ready_generation(&self) -> Option<u64> {
        let s = self.lock();
        s.latest_ready.and_then(|i| s.slots[i].generation)
    }

    /// Computed generations not yet displayed.
    pub fn lookahead(&self) -> u64 {
        let s = self.lock();
        s.calculated_number.saturating_sub(s.displayed_number)
    }

    /// Copy of the buffered generation `generation`, if still held.
    pub fn buffered(&self, generation: u64) -> Option<CellSet> {
        let s = self.lock();
        let slot = &s.slots[s.slot_of(generation)];
        (slot.generation == Some(generation)).then(|| slot.cells.clone())
    }

    // Grid passthroughs. Callers only edit while no run is in progress.

    pub fn is_alive(&self, cell: Cell) -> bool {
        self.lock().grid.is_alive(cell)
    }

    /// Edit one cell and reseed the buffer, so nothing computed from the
    /// previous grid can be shown afterwards.
    pub fn set_alive(&self, cell: Cell, alive: bool) {
        let mut s = self.lock();
        s.grid.set_alive(cell, alive);
        s.reset();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().grid.is_empty()
    }

    pub fn population(&self) -> usize {
        self.lock().grid.population()
    }

    /// Deep copy of the displayed set.
    pub fn living_cells(&self) -> CellSet {
        self.lock().grid.living_cells()
    }

    pub fn has_state_changed(&self) -> bool {
        self.lock().grid.has_state_changed()
    }

    pub fn reset_state_change(&self) {
        self.lock().grid.reset_state_change();
    }

    /// Copy of the displayed set if it changed since the last call, clearing
    /// the dirty flag in the same critical section.
    pub fn take_changed(&self) -> Option<CellSet> {
        let mut s = self.lock();
        if !s.grid.has_state_changed() {
            return None;
        }
        s.grid.reset_state_change();
        Some(s.grid.living_cells())
    }

    pub fn clear_grid(&self) {
        let mut s = self.lock();
        s.grid.clear();
        s.reset();
    }

    /// Replace the grid with `cells` and reseed the buffer from it.
    pub fn set_pattern(&self, cells: CellSet) {
        let mut s = self.lock();
        s.grid.set_cells(cells);
        s.reset();
    }

    pub fn save_grid(&self) {
        self.lock().grid.save();
    }

    /// Restore the saved grid and reseed the buffer. `false` if nothing was saved.
    pub fn load_grid(&self) -> bool {
        let mut s = self.lock();
        if !s.grid.load() {
            return false;
        }
        s.reset();
        true
    }

    pub fn saved_grid(&self) -> Option<CellSet> {
        self.lock().grid.saved().cloned()
    }

    /// Run `f` against the grid under the lock, then reseed the buffer.
    pub fn edit_grid<R>(&self, f: impl FnOnce(&mut GridState) -> R) -> R {
        let mut s = self.lock();
        let out = f(&mut s.grid);
        s.reset();
        out
    }
}

/// Read-only access to a buffer owned by a [`Simulation`](crate::Simulation).
///
/// Exposes cursors and copies of the displayed set, never the edit surface,
/// so a running pipeline cannot be modified behind the coordinator's back.
#[derive(Clone, Copy)]
pub struct RingView<'a> {
    ring: &'a GenerationRing,
}

impl<'a> RingView<'a> {
    pub(crate) fn new(ring: &'a GenerationRing) -> Self {
        Self { ring }
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn max_ahead(&self) -> u64 {
        self.ring.max_ahead()
    }

    pub fn status(&self) -> RingStatus {
        self.ring.status()
    }

    pub fn displayed_generation(&self) -> u64 {
        self.ring.displayed_generation()
    }

    pub fn calculated_generation(&self) -> u64 {
        self.ring.calculated_generation()
    }

    pub fn latest_ready_generation(&self) -> Option<u64> {
        self.ring.latest_ready_generation()
    }

    pub fn lookahead(&self) -> u64 {
        self.ring.lookahead()
    }

    pub fn buffered(&self, generation: u64) -> Option<CellSet> {
        self.ring.buffered(generation)
    }
}

impl Default for GenerationRing {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}
