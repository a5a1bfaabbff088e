//! Per-document, per-stage checkpoint storage.
//!
//! Stores hold opaque text; interpreting it is up to the pipeline.

mod fs;
mod memory;

pub use fs::FsCheckpointStore;
pub use memory::MemoryCheckpointStore;

use std::fmt;
use std::path::PathBuf;

/// Pipeline stage a checkpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Product fields from the document.
    Extraction,
    /// Newest SDS lookup from web results.
    Verification,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Extraction, Stage::Verification];

    /// Stage number used in file names and payloads.
    pub fn number(self) -> u8 {
        match self {
            Stage::Extraction => 1,
            Stage::Verification => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {}", self.number())
    }
}

/// Checkpoint storage errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint store lock poisoned")]
    Poisoned,
}

/// Storage for stage outputs keyed by document and stage.
pub trait CheckpointStore: Send + Sync {
    /// True when a value is stored for this document and stage.
    fn exists(&self, document: &str, stage: Stage) -> bool;

    /// Stored value, or `None` when absent.
    fn read(&self, document: &str, stage: Stage) -> Result<Option<String>, CheckpointError>;

    /// Store a value, replacing any previous one.
    fn write(&self, document: &str, stage: Stage, value: &str) -> Result<(), CheckpointError>;

    /// Tell the store which documents the current batch enumerated.
    fn register(&self, _documents: &[String]) -> Result<(), CheckpointError> {
        Ok(())
    }
}
