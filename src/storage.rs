//! Results buffer and the append-only CSV output.
//!
//! Rows are serialized in memory and appended with a single write per flush.
//! The header row is written only when the file is missing or empty, so
//! repeated runs against the same path accumulate rows under one header.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::models::LookupResult;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write results to '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize results: {0}")]
    Csv(#[from] csv::Error),
}

/// Terminal results waiting to be flushed. Owned by the coordinator.
#[derive(Debug, Default)]
pub struct ResultsBuffer {
    results: Vec<LookupResult>,
}

impl ResultsBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: LookupResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Write everything to `output` and clear on success.
    ///
    /// On failure the buffer is kept so a later flush can retry.
    pub fn flush_to(&mut self, output: &CsvOutput) -> Result<usize, StorageError> {
        if self.results.is_empty() {
            return Ok(0);
        }
        let written = output.append(&self.results)?;
        self.results.clear();
        Ok(written)
    }
}

/// Append-only CSV results file.
#[derive(Debug, Clone)]
pub struct CsvOutput {
    path: PathBuf,
}

impl CsvOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Whether the next append has to start with a header row.
    fn needs_header(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true)
    }

    /// Append rows; returns how many were written.
    pub fn append(&self, results: &[LookupResult]) -> Result<usize, StorageError> {
        let with_header = self.needs_header();
        let mut writer = csv::WriterBuilder::new()
            .has_headers(with_header)
            .from_writer(Vec::new());
        for result in results {
            writer.serialize(result.to_row())?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| self.io_error(e.into_error()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).map_err(|e| self.io_error(e))?;

        debug!(
            "Appended {} rows to {} (header: {})",
            results.len(),
            self.path.display(),
            with_header
        );
        Ok(results.len())
    }
}

/// Flush the buffer, logging the result. Returns whether the buffer is now empty.
pub fn flush_logged(buffer: &mut ResultsBuffer, output: &CsvOutput) -> bool {
    match buffer.flush_to(output) {
        Ok(0) => true,
        Ok(written) => {
            info!("Saved {} results to {}", written, output.path().display());
            true
        }
        Err(e) => {
            error!("{} ({} results kept in memory)", e, buffer.len());
            false
        }
    }
}
