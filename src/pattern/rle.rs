//! Run-length encoded pattern bodies.
//!
//! Tokens are `{count}{tag}` with an optional decimal count (missing or `0`
//! means 1):
//! - `b` / `.` skip `count` dead cells,
//! - `o` place `count` live cells,
//! - `$` end `count` rows,
//! - `!` end of pattern; anything after it is ignored.
//!
//! Whitespace between tokens is skipped, since bodies are often wrapped.
//! Rows are flipped so that row 0 of the text lands on `y = height - 1`.

use thiserror::Error;

use crate::cell::{Cell, CellSet, cell_set_with_capacity};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RleError {
    #[error("RLE data is empty")]
    Empty,
    #[error("invalid RLE token {token:?} at offset {offset}")]
    InvalidToken { token: char, offset: usize },
    #[error("run count or position overflows at offset {offset}")]
    Overflow { offset: usize },
    #[error("run count at offset {offset} is not followed by a tag")]
    DanglingCount { offset: usize },
    #[error("RLE data is missing the '!' terminator")]
    MissingTerminator,
}

#[inline]
fn is_tag(c: char) -> bool {
    matches!(c, 'b' | '.' | 'o' | '$' | '!')
}

/// Quick structural check used to filter pattern libraries: non-empty,
/// only digits and tags, ending with `!`. Any whitespace fails.
pub fn validate(body: &str) -> bool {
    !body.is_empty()
        && body.ends_with('!')
        && body.chars().all(|c| c.is_ascii_digit() || is_tag(c))
}

/// Decode an RLE body into live cells.
pub fn decode(body: &str, height: i32) -> Result<CellSet, RleError> {
    if body.trim().is_empty() {
        return Err(RleError::Empty);
    }

    let mut cells = cell_set_with_capacity(body.len());
    let mut x: i64 = 0;
    let mut row: i64 = 0;
    let mut count: Option<u32> = None;
    let mut count_offset = 0;
    let top = i64::from(height) - 1;

    for (offset, c) in body.char_indices() {
        if let Some(digit) = c.to_digit(10) {
            if count.is_none() {
                count_offset = offset;
            }
            let next = count
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|n| n.checked_add(digit))
                .ok_or(RleError::Overflow { offset })?;
            count = Some(next);
            continue;
        }
        if c.is_whitespace() {
            continue;
        }
        if !is_tag(c) {
            return Err(RleError::InvalidToken { token: c, offset });
        }

        let run = i64::from(count.take().filter(|&n| n > 0).unwrap_or(1));
        match c {
            'b' | '.' => x += run,
            'o' => {
                let y = top - row;
                let end = x + run;
                if end - 1 > i64::from(i32::MAX) || y < i64::from(i32::MIN) {
                    return Err(RleError::Overflow { offset });
                }
                for cx in x..end {
                    cells.insert(Cell::new(cx as i32, y as i32));
                }
                x = end;
            }
            '$' => {
                x = 0;
                row += run;
            }
            _ => return Ok(cells),
        }
        if x > i64::from(i32::MAX) || row > i64::from(u32::MAX) {
            return Err(RleError::Overflow { offset });
        }
    }

    match count {
        Some(_) => Err(RleError::DanglingCount {
            offset: count_offset,
        }),
        None => Err(RleError::MissingTerminator),
    }
}
