//! Cell coordinates and the hash set used for every generation.
//!
//! Generations are sparse sets of live `(x, y)` coordinates. The default
//! SipHash is far slower than needed for two small integers, so sets use a
//! multiply-rotate mix of the coordinate words instead.

use std::collections::HashSet;
use std::fmt;
use std::hash::{BuildHasherDefault, Hasher};

use serde::{Deserialize, Serialize};

const MX: u64 = 0x517c_c1b7_2722_0a95;
const MY: u64 = 0x6c62_272e_07bb_0142;

/// Integer grid coordinate of a single cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    #[inline(always)]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline(always)]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }

    /// The 8 Moore neighbors, excluding the cell itself.
    #[inline]
    pub fn neighbors(self) -> impl Iterator<Item = Cell> {
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| self.offset(dx, dy))
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Cell> for (i32, i32) {
    fn from(cell: Cell) -> Self {
        (cell.x, cell.y)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Lightweight coordinate mixer.
///
/// `Cell`'s derived `Hash` feeds exactly two `write_i32` calls; each word is
/// folded in with its own multiplier so `(a, b)` and `(b, a)` land apart.
#[derive(Clone, Copy, Default)]
pub struct CellHasher {
    state: u64,
    words: u32,
}

impl Hasher for CellHasher {
    #[inline(always)]
    fn write_i32(&mut self, value: i32) {
        let mul = if self.words & 1 == 0 { MX } else { MY };
        let mixed = (value as u32 as u64).wrapping_mul(mul);
        self.state = self.state.rotate_right(32) ^ mixed;
        self.words = self.words.wrapping_add(1);
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.write_i32(i32::from_le_bytes(word));
        }
    }

    #[inline(always)]
    fn finish(&self) -> u64 {
        let h = self.state.wrapping_mul(MX);
        h ^ (h >> 29)
    }
}

pub type CellBuildHasher = BuildHasherDefault<CellHasher>;

/// A set of live cells: one generation.
pub type CellSet = HashSet<Cell, CellBuildHasher>;

/// Empty set with room for `cap` cells.
#[inline]
pub fn cell_set_with_capacity(cap: usize) -> CellSet {
    CellSet::with_capacity_and_hasher(cap, CellBuildHasher::default())
}

/// Collect `(x, y)` pairs into a [`CellSet`].
pub fn cell_set_from<I, C>(cells: I) -> CellSet
where
    I: IntoIterator<Item = C>,
    C: Into<Cell>,
{
    cells.into_iter().map(Into::into).collect()
}

/// Cells ordered by `(x, y)`, the order snapshots use.
pub fn sorted_cells(cells: &CellSet) -> Vec<Cell> {
    let mut out: Vec<Cell> = cells.iter().copied().collect();
    out.sort_unstable();
    out
}

/// Inclusive bounding box `(min_x, min_y, max_x, max_y)`, `None` when empty.
pub fn bounds(cells: &CellSet) -> Option<(i32, i32, i32, i32)> {
    let mut iter = cells.iter();
    let first = iter.next()?;
    let init = (first.x, first.y, first.x, first.y);
    Some(iter.fold(init, |(min_x, min_y, max_x, max_y), c| {
        (min_x.min(c.x), min_y.min(c.y), max_x.max(c.x), max_y.max(c.y))
    }))
}

#[cfg(test)]
mod tests {
    use std::hash::{BuildHasher, Hash};

    use super::{Cell, CellBuildHasher, bounds, cell_set_from, sorted_cells};

    fn hash_of(cell: Cell) -> u64 {
        let mut hasher = CellBuildHasher::default().build_hasher();
        cell.hash(&mut hasher);
        std::hash::Hasher::finish(&hasher)
    }

    #[test]
    fn transposed_coordinates_hash_differently() {
        assert_ne!(hash_of(Cell::new(1, 2)), hash_of(Cell::new(2, 1)));
        assert_ne!(hash_of(Cell::new(-5, 9)), hash_of(Cell::new(9, -5)));
        assert_eq!(hash_of(Cell::new(7, -3)), hash_of(Cell::new(7, -3)));
    }

    #[test]
    fn dedups_negative_and_positive_coordinates() {
        let mut set = cell_set_from([(1, 2), (-5, 9)]);
        assert!(!set.insert(Cell::new(1, 2)));
        assert!(set.insert(Cell::new(-1, -2)));
        for i in 0..10_000 {
            set.insert(Cell::new(i, -i));
        }
        for i in 0..10_000 {
            assert!(set.contains(&Cell::new(i, -i)));
        }
    }

    #[test]
    fn neighbors_exclude_center() {
        let center = Cell::new(4, 4);
        let around: Vec<Cell> = center.neighbors().collect();
        assert_eq!(around.len(), 8);
        assert!(!around.contains(&center));
        assert!(around.contains(&Cell::new(3, 5)));
        assert!(around.contains(&Cell::new(5, 3)));
    }

    #[test]
    fn sorted_and_bounds() {
        let set = cell_set_from([(2, 1), (0, 1), (5, -3)]);
        assert_eq!(
            sorted_cells(&set),
            vec![Cell::new(0, 1), Cell::new(2, 1), Cell::new(5, -3)]
        );
        assert_eq!(bounds(&set), Some((0, -3, 5, 1)));
        assert_eq!(bounds(&cell_set_from::<_, Cell>([])), None);
    }
}
