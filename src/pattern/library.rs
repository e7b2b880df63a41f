//! Pattern metadata, `.rle` file import and the browsable pattern library.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::PatternError;
use super::rle;
use crate::cell::CellSet;

/// Patterns larger than this on either side are not offered.
pub const MAX_PATTERN_SIDE: i32 = 300;
/// Patterns must be strictly larger than this on both sides.
pub const MIN_PATTERN_SIDE: i32 = 2;
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One importable pattern: header metadata plus the raw RLE body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PatternData {
    pub id: u32,
    pub name: String,
    pub author: String,
    pub description: String,
    pub width: i32,
    pub height: i32,
    pub file_name: String,
    pub rle_data: String,
}

impl PatternData {
    /// Parse the text of a `.rle` file.
    ///
    /// Understands `#N` (name), `#O` (author) and `#C` (description) comment
    /// lines and the `x = W, y = H[, rule = ...]` header; other `#` lines are
    /// skipped and the remaining lines are joined into the body. Returns
    /// `None` when the file has no body.
    pub fn from_rle_file(text: &str, file_name: &str) -> Option<Self> {
        let mut pattern = Self {
            file_name: file_name.to_string(),
            ..Self::default()
        };
        let mut descriptions = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("#N") {
                pattern.name = rest.trim().to_string();
            } else if let Some(rest) = trimmed.strip_prefix("#O") {
                pattern.author = rest.trim().to_string();
            } else if let Some(rest) = trimmed.strip_prefix("#C") {
                descriptions.push(rest.trim().to_string());
            } else if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            } else if let Some((width, height)) = parse_dimensions(trimmed) {
                pattern.width = width;
                pattern.height = height;
            } else {
                pattern.rle_data.push_str(trimmed);
            }
        }

        if pattern.rle_data.is_empty() {
            return None;
        }
        pattern.description = descriptions.join(" ");
        Some(pattern)
    }

    /// Decode the body into live cells, flipped to the grid's y-up convention.
    pub fn to_cells(&self) -> Result<CellSet, PatternError> {
        Ok(rle::decode(&self.rle_data, self.height)?)
    }

    /// Whether the library should offer this pattern: credited author,
    /// sane dimensions and a well-formed body.
    pub fn is_playable(&self) -> bool {
        !self.author.trim().is_empty()
            && (MIN_PATTERN_SIDE + 1..=MAX_PATTERN_SIDE).contains(&self.width)
            && (MIN_PATTERN_SIDE + 1..=MAX_PATTERN_SIDE).contains(&self.height)
            && rle::validate(&self.rle_data)
    }

    fn display_name(&self) -> &str {
        let cut = self.name.len().saturating_sub(4);
        match (self.name.get(..cut), self.name.get(cut..)) {
            (Some(stem), Some(ext)) if ext.eq_ignore_ascii_case(".rle") => stem,
            _ => &self.name,
        }
    }
}

/// `x = 3, y = 3, rule = B3/S23` -> `(3, 3)`.
fn parse_dimensions(line: &str) -> Option<(i32, i32)> {
    let mut width = None;
    let mut height = None;
    for part in line.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim() {
            "x" => width = value.trim().parse().ok(),
            "y" => height = value.trim().parse().ok(),
            _ => {}
        }
    }
    let starts_with_x = line.trim_start().starts_with('x');
    match (starts_with_x, width, height) {
        (true, Some(w), Some(h)) => Some((w, h)),
        (true, _, _) if line.contains('=') => Some((width.unwrap_or(0), height.unwrap_or(0))),
        _ => None,
    }
}

/// On-disk pattern collection, as produced by the import tool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PatternCollection {
    pub source_folder: String,
    pub total_patterns: usize,
    pub patterns: Vec<PatternData>,
}

impl PatternCollection {
    /// Build a collection from `(file_name, file_text)` pairs. Files without
    /// a body are skipped; ids are assigned in input order starting at 1.
    pub fn from_rle_sources<'a, I>(source_folder: &str, sources: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut patterns = Vec::new();
        for (file_name, text) in sources {
            match PatternData::from_rle_file(text, file_name) {
                Some(mut pattern) => {
                    pattern.id = patterns.len() as u32 + 1;
                    patterns.push(pattern);
                }
                None => log::warn!("skipping {file_name}: no RLE body"),
            }
        }
        Self {
            source_folder: source_folder.to_string(),
            total_patterns: patterns.len(),
            patterns,
        }
    }

    pub fn to_json(&self) -> Result<String, PatternError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Filtered, browsable set of playable patterns.
#[derive(Clone, Debug, Default)]
pub struct PatternLibrary {
    patterns: Vec<PatternData>,
}

impl PatternLibrary {
    /// Keep only playable patterns, stripping a trailing `.rle` from names.
    pub fn from_collection(collection: PatternCollection) -> Self {
        let total = collection.patterns.len();
        let patterns: Vec<PatternData> = collection
            .patterns
            .into_iter()
            .filter(|p| {
                let keep = p.is_playable();
                if !keep && !p.author.trim().is_empty() && !rle::validate(&p.rle_data) {
                    log::warn!("pattern '{}' has invalid RLE data, filtered out", p.name);
                }
                keep
            })
            .map(|mut p| {
                p.name = p.display_name().to_string();
                p
            })
            .collect();
        log::info!("loaded {} of {total} patterns", patterns.len());
        Self { patterns }
    }

    pub fn from_json(json: &str) -> Result<Self, PatternError> {
        let collection: PatternCollection = serde_json::from_str(json)?;
        Ok(Self::from_collection(collection))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PatternError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternData> {
        self.patterns.iter()
    }

    pub fn first(&self) -> Option<&PatternData> {
        self.patterns.first()
    }

    pub fn by_name(&self, name: &str) -> Option<&PatternData> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn by_id(&self, id: u32) -> Option<&PatternData> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Like [`PatternLibrary::by_name`], as an error when missing.
    pub fn find(&self, name: &str) -> Result<&PatternData, PatternError> {
        self.by_name(name)
            .ok_or_else(|| PatternError::NotFound(name.to_string()))
    }

    /// 1-based page of at most `per_page` patterns; empty past the end.
    pub fn page(&self, page: usize, per_page: usize) -> &[PatternData] {
        let per_page = per_page.max(1);
        let start = page.saturating_sub(1).saturating_mul(per_page);
        if page == 0 || start >= self.patterns.len() {
            return &[];
        }
        let end = (start + per_page).min(self.patterns.len());
        &self.patterns[start..end]
    }

    pub fn total_pages(&self, per_page: usize) -> usize {
        self.patterns.len().div_ceil(per_page.max(1))
    }
}
