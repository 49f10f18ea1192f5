//! Input reader for delimited phone number lists.
//!
//! The first column of each line holds the number; any further columns are
//! ignored. A header row is detected heuristically on the first non-blank
//! line only.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{clean_digits, PhoneNumber, PHONE_DIGITS};

/// Shortest first cell that can still be a phone number.
const MIN_PHONE_CELL_LEN: usize = 7;

/// How many rejected lines are logged individually.
const MAX_LOGGED_REJECTIONS: usize = 5;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input file '{}' not found", path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read input file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Numbers loaded from an input source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBatch {
    /// Valid numbers in file order.
    pub numbers: Vec<PhoneNumber>,
    /// Non-blank lines that did not normalize to ten digits.
    pub rejected: usize,
    /// Whether the first non-blank line was skipped as a header.
    pub had_header: bool,
}

/// Read and normalize all numbers from a file.
pub fn read_numbers(path: &Path) -> Result<InputBatch, InputError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            InputError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            InputError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let text = String::from_utf8_lossy(&bytes);
    let batch = parse_numbers(&text);

    info!(
        "Loaded {} valid {}-digit phone numbers from {}",
        batch.numbers.len(),
        PHONE_DIGITS,
        path.display()
    );
    if batch.rejected > 0 {
        info!("Skipped {} invalid numbers", batch.rejected);
    }

    Ok(batch)
}

/// Parse numbers from delimited text.
pub fn parse_numbers(text: &str) -> InputBatch {
    let mut batch = InputBatch::default();
    let mut seen_first = false;

    for line in text.lines() {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }

        if !seen_first {
            seen_first = true;
            if is_header(line) {
                info!("Detected header row: {}", truncate(first_cell(line), 50));
                batch.had_header = true;
                continue;
            }
        }

        let raw = first_cell(line);
        match PhoneNumber::normalize(raw) {
            Some(phone) => batch.numbers.push(phone),
            None => {
                batch.rejected += 1;
                if batch.rejected <= MAX_LOGGED_REJECTIONS {
                    let cleaned = clean_digits(raw);
                    warn!(
                        "Skipping invalid number: {} -> {} ({} digits)",
                        raw,
                        cleaned,
                        cleaned.len()
                    );
                }
            }
        }
    }

    batch
}

/// Decide whether a first line is a header rather than data.
pub fn is_header(line: &str) -> bool {
    let cell = first_cell(line);
    cell.chars().any(char::is_alphabetic)
        || cell.chars().count() < MIN_PHONE_CELL_LEN
        || !cell.chars().any(|c| c.is_ascii_digit())
        || clean_digits(cell).len() < PHONE_DIGITS
}

/// First comma-delimited cell with whitespace and quotes stripped.
fn first_cell(line: &str) -> &str {
    line.split(',')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let prefix: String = s.chars().take(max_chars).collect();
        format!("{}...", prefix)
    }
}
