//! Live grid state: the currently displayed generation plus user edits.

use rand::Rng;

use crate::cell::{Cell, CellSet, cell_set_with_capacity};

/// Authoritative set of live cells.
///
/// Edited directly while the simulation is idle. While running it is only
/// replaced wholesale by the generation buffer when a new generation is shown.
#[derive(Clone, Debug, Default)]
pub struct GridState {
    living: CellSet,
    /// In-memory save slot.
    saved: Option<CellSet>,
    /// Set whenever `living` changes; cleared by the renderer.
    state_changed: bool,
}

impl GridState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: CellSet) -> Self {
        Self {
            living: cells,
            saved: None,
            state_changed: true,
        }
    }

    #[inline]
    pub fn is_alive(&self, cell: Cell) -> bool {
        self.living.contains(&cell)
    }

    pub fn set_alive(&mut self, cell: Cell, alive: bool) {
        let changed = if alive {
            self.living.insert(cell)
        } else {
            self.living.remove(&cell)
        };
        self.state_changed |= changed;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.living.is_empty()
    }

    #[inline]
    pub fn population(&self) -> usize {
        self.living.len()
    }

    /// Deep copy of the live set.
    pub fn living_cells(&self) -> CellSet {
        self.living.clone()
    }

    pub(crate) fn living(&self) -> &CellSet {
        &self.living
    }

    /// Replace the live set with the contents of `cells`, reusing storage.
    pub fn replace_from(&mut self, cells: &CellSet) {
        self.living.clear();
        self.living.extend(cells.iter().copied());
        self.state_changed = true;
    }

    pub fn set_cells(&mut self, cells: CellSet) {
        self.living = cells;
        self.state_changed = true;
    }

    pub fn clear(&mut self) {
        self.living.clear();
        self.state_changed = true;
    }

    #[inline]
    pub fn has_state_changed(&self) -> bool {
        self.state_changed
    }

    #[inline]
    pub fn reset_state_change(&mut self) {
        self.state_changed = false;
    }

    /// Snapshot the live set into the save slot.
    pub fn save(&mut self) {
        self.saved = Some(self.living.clone());
    }

    /// Restore the save slot. Returns `false` if nothing was saved.
    pub fn load(&mut self) -> bool {
        match &self.saved {
            Some(saved) => {
                self.living = saved.clone();
                self.state_changed = true;
                true
            }
            None => false,
        }
    }

    pub fn saved(&self) -> Option<&CellSet> {
        self.saved.as_ref()
    }

    /// Fill a `width` x `height` block anchored at the origin with random cells.
    pub fn randomize<R: Rng>(&mut self, width: i32, height: i32, density: f64, rng: &mut R) {
        let density = density.clamp(0.0, 1.0);
        let area = (width.max(0) as usize) * (height.max(0) as usize);
        let mut cells = cell_set_with_capacity((area as f64 * density) as usize);
        for y in 0..height {
            for x in 0..width {
                if rng.random::<f64>() < density {
                    cells.insert(Cell::new(x, y));
                }
            }
        }
        self.set_cells(cells);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::GridState;
    use crate::cell::{Cell, cell_set_from};

    #[test]
    fn edits_toggle_dirty_flag_only_on_change() {
        let mut grid = GridState::new();
        assert!(grid.is_empty());
        assert!(!grid.has_state_changed());

        grid.set_alive(Cell::new(3, -2), true);
        assert!(grid.is_alive(Cell::new(3, -2)));
        assert!(grid.has_state_changed());

        grid.reset_state_change();
        grid.set_alive(Cell::new(3, -2), true);
        assert!(!grid.has_state_changed());

        grid.set_alive(Cell::new(3, -2), false);
        assert!(!grid.is_alive(Cell::new(3, -2)));
        assert!(grid.has_state_changed());
    }

    #[test]
    fn living_cells_is_a_detached_copy() {
        let mut grid = GridState::from_cells(cell_set_from([(0, 0), (1, 1)]));
        let copy = grid.living_cells();
        grid.set_alive(Cell::new(5, 5), true);
        assert_eq!(copy.len(), 2);
        assert_eq!(grid.population(), 3);
    }

    #[test]
    fn save_then_load_restores_snapshot() {
        let mut grid = GridState::new();
        assert!(!grid.load());

        grid.set_cells(cell_set_from([(0, 0), (1, 0)]));
        grid.save();
        grid.clear();
        assert!(grid.is_empty());

        grid.reset_state_change();
        assert!(grid.load());
        assert!(grid.has_state_changed());
        assert_eq!(grid.living_cells(), cell_set_from([(0, 0), (1, 0)]));
    }

    #[test]
    fn randomize_stays_inside_block() {
        let mut grid = GridState::new();
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED);
        grid.randomize(16, 8, 0.5, &mut rng);
        assert!(!grid.is_empty());
        for cell in grid.living_cells() {
            assert!((0..16).contains(&cell.x) && (0..8).contains(&cell.y));
        }
    }
}
