//! Shared helpers: bounded file reads and player-text normalization.

use std::fs;
use std::path::Path;

use crate::error::{CasebookError, Result};

/// Maximum story file size that will be read into memory (16 MB).
pub const MAX_STORY_SIZE: u64 = 16 * 1024 * 1024;

/// Read a file into a string, refusing anything larger than `max_size`.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| CasebookError::persistence(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(CasebookError::content(format!(
            "{} is too large ({} bytes, max {} bytes)",
            path.display(),
            size,
            max_size
        )));
    }

    fs::read_to_string(path).map_err(|e| CasebookError::persistence(path, e))
}

/// Normalize player input for matching: lowercase, trim, and collapse runs
/// of whitespace into single spaces.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a normalized utterance contains `term` after normalizing the term
/// the same way. Blank terms never match.
pub fn contains_term(normalized: &str, term: &str) -> bool {
    let term = normalize(term);
    !term.is_empty() && normalized.contains(&term)
}
