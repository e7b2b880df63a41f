//! Portable JSON form of a grid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::{CellSet, cell_set_from, sorted_cells};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

/// Live cells as `[x, y]` pairs, sorted so equal grids serialize identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cells: Vec<(i32, i32)>,
}

impl Snapshot {
    pub fn from_cells(cells: &CellSet) -> Self {
        Self {
            cells: sorted_cells(cells).into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_cells(&self) -> CellSet {
        cell_set_from(self.cells.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
