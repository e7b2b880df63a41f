//! Pattern import: RLE bodies and the pattern library.

mod library;
mod rle;

use thiserror::Error;

pub use library::{
    DEFAULT_PAGE_SIZE, MAX_PATTERN_SIDE, MIN_PATTERN_SIDE, PatternCollection, PatternData,
    PatternLibrary,
};
pub use rle::{RleError, decode, validate};

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("failed to read pattern file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed pattern collection: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Rle(#[from] RleError),
    #[error("no pattern named {0:?}")]
    NotFound(String),
}
