//! In-memory checkpoints for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{CheckpointError, CheckpointStore, Stage};

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<(String, Stage), String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn exists(&self, document: &str, stage: Stage) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(&(document.to_string(), stage)))
            .unwrap_or(false)
    }

    fn read(&self, document: &str, stage: Stage) -> Result<Option<String>, CheckpointError> {
        let entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        Ok(entries.get(&(document.to_string(), stage)).cloned())
    }

    fn write(&self, document: &str, stage: Stage, value: &str) -> Result<(), CheckpointError> {
        let mut entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        entries.insert((document.to_string(), stage), value.to_string());
        Ok(())
    }
}
