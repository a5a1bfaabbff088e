//! Processed log.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{needs_header, open_append, reset, OutputError};

const HEADER: [&str; 1] = ["document"];

/// Append-only list of fully processed document ids.
#[derive(Debug, Clone)]
pub struct ProcessedLog {
    path: PathBuf,
    ids: HashSet<String>,
}

impl ProcessedLog {
    /// Open the log, loading ids already recorded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, OutputError> {
        let path = path.into();
        open_append(&path, &HEADER)?;
        let ids = Self::read_ids(&path)?;
        Ok(Self { path, ids })
    }

    /// Ids recorded in a log file, without creating or touching it.
    pub fn read_ids(path: &Path) -> Result<HashSet<String>, OutputError> {
        let mut ids = HashSet::new();
        if needs_header(path) {
            return Ok(ids);
        }

        let mut reader = csv::Reader::from_path(path).map_err(|e| OutputError::csv(path, e))?;
        for record in reader.records() {
            let record = record.map_err(|e| OutputError::csv(path, e))?;
            if let Some(id) = record.get(0).filter(|id| !id.is_empty()) {
                ids.insert(id.to_string());
            }
        }
        Ok(ids)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Record a document as processed.
    pub fn append(&mut self, id: &str) -> Result<(), OutputError> {
        let file = open_append(&self.path, &HEADER)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record([id])
            .map_err(|e| OutputError::csv(&self.path, e))?;
        writer
            .flush()
            .map_err(|e| OutputError::io(&self.path, e))?;
        self.ids.insert(id.to_string());
        Ok(())
    }

    /// Forget every recorded id.
    pub fn truncate(&mut self) -> Result<(), OutputError> {
        reset(&self.path, &HEADER)?;
        self.ids.clear();
        Ok(())
    }
}
