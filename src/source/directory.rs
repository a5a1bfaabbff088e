//! Filesystem-backed document sources.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DocumentRef, DocumentSource, LoadError};

/// Exactly one document.
#[derive(Debug, Clone)]
pub struct SingleFileSource {
    path: PathBuf,
}

impl SingleFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for SingleFileSource {
    fn enumerate(&self) -> Result<Vec<DocumentRef>, LoadError> {
        if !self.path.is_file() {
            return Err(LoadError::NotFound(self.path.clone()));
        }
        Ok(vec![DocumentRef::from_path(&self.path)])
    }
}

/// Every matching file in a directory, sorted by file name.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl DirectorySource {
    /// Match files whose extension is in `extensions` (case-insensitive).
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

impl DocumentSource for DirectorySource {
    fn enumerate(&self) -> Result<Vec<DocumentRef>, LoadError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(self.dir.clone())
            } else {
                LoadError::Io {
                    path: self.dir.clone(),
                    source,
                }
            }
        })?;

        let mut docs: Vec<DocumentRef> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.matches(path))
            .map(DocumentRef::from_path)
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        debug!("Found {} documents in {}", docs.len(), self.dir.display());
        Ok(docs)
    }
}
