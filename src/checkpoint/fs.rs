//! Checkpoints as JSON files next to each other in one directory.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use tracing::debug;

use super::{CheckpointError, CheckpointStore, Stage};

/// File-backed store writing `<file name>_<stage>.json`.
///
/// Writes go through a temp file in the same directory and are renamed into
/// place, so readers never see a partial file.
///
/// Older runs named files `<stem>_<stage>.json`. Those are still read for a
/// registered document when no other registered document could claim the
/// same name; writes always use the full file name.
#[derive(Debug)]
pub struct FsCheckpointStore {
    dir: PathBuf,
    legacy: RwLock<HashSet<String>>,
}

fn stem(document: &str) -> &str {
    Path::new(document)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(document)
}

fn file_name(key: &str, stage: Stage) -> String {
    format!("{}_{}.json", key, stage.number())
}

impl FsCheckpointStore {
    /// Open a store, creating the directory when needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CheckpointError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            legacy: RwLock::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path new checkpoints are written to.
    pub fn path_for(&self, document: &str, stage: Stage) -> PathBuf {
        self.dir.join(file_name(document, stage))
    }

    /// Stem-based path from older runs, if this document may use it.
    fn legacy_path_for(&self, document: &str, stage: Stage) -> Option<PathBuf> {
        let allowed = self
            .legacy
            .read()
            .map(|legacy| legacy.contains(document))
            .unwrap_or(false);
        allowed.then(|| self.dir.join(file_name(stem(document), stage)))
    }

    /// Existing file holding the checkpoint, preferring the current name.
    fn existing_path(&self, document: &str, stage: Stage) -> Option<PathBuf> {
        let path = self.path_for(document, stage);
        if path.is_file() {
            return Some(path);
        }
        self.legacy_path_for(document, stage)
            .filter(|legacy| legacy.is_file())
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn exists(&self, document: &str, stage: Stage) -> bool {
        self.existing_path(document, stage).is_some()
    }

    fn read(&self, document: &str, stage: Stage) -> Result<Option<String>, CheckpointError> {
        let Some(path) = self.existing_path(document, stage) else {
            return Ok(None);
        };
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }

    fn write(&self, document: &str, stage: Stage, value: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(document, stage);
        let io_err = |source| CheckpointError::Io {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(value.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        debug!("Wrote {} checkpoint {}", stage, path.display());
        Ok(())
    }

    /// A document may fall back to its stem-based name only when its stem
    /// is unique in the batch and that name is not another document's
    /// current file name.
    fn register(&self, documents: &[String]) -> Result<(), CheckpointError> {
        let mut stems: HashMap<&str, usize> = HashMap::new();
        for document in documents {
            *stems.entry(stem(document)).or_default() += 1;
        }
        let current: HashSet<&str> = documents.iter().map(String::as_str).collect();

        let allowed: HashSet<String> = documents
            .iter()
            .filter(|document| {
                let key = stem(document);
                stems.get(key) == Some(&1) && (key == document.as_str() || !current.contains(key))
            })
            .cloned()
            .collect();

        debug!(
            "{} of {} documents may read stem-named checkpoints",
            allowed.len(),
            documents.len()
        );
        *self.legacy.write().map_err(|_| CheckpointError::Poisoned)? = allowed;
        Ok(())
    }
}
