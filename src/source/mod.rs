//! Document sources.
//!
//! A source enumerates document references in a stable order and loads the
//! text content of each one on demand.

mod directory;
mod loader;

pub use directory::{DirectorySource, SingleFileSource};
pub use loader::load_text;

use std::path::PathBuf;

/// A document reference produced by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Identifier used in checkpoints and result rows (the file name).
    pub id: String,
    pub path: PathBuf,
}

impl DocumentRef {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { id, path }
    }
}

/// A loaded document.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    /// False when the file parsed but yielded no text.
    pub valid: bool,
}

/// Errors from enumerating or loading documents.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract PDF text from {path}: {reason}")]
    Pdf { path: PathBuf, reason: String },

    #[error("{path} is not valid UTF-8 text")]
    Encoding { path: PathBuf },

    #[error("source path not found: {0}")]
    NotFound(PathBuf),
}

/// Contract shared by document sources.
pub trait DocumentSource: Send + Sync {
    /// Document references in processing order.
    fn enumerate(&self) -> Result<Vec<DocumentRef>, LoadError>;

    /// Load one document's text content.
    fn load(&self, doc: &DocumentRef) -> Result<Document, LoadError> {
        let content = load_text(&doc.path)?;
        Ok(Document {
            id: doc.id.clone(),
            valid: !content.trim().is_empty(),
            content,
        })
    }
}
