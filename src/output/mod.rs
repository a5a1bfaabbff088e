//! CSV outputs: the result table and the processed log.
//!
//! Both files are append-only during a run and flushed after every write, so
//! an interrupted batch leaves complete lines behind.

mod processed;
mod table;

pub use processed::ProcessedLog;
pub use table::ResultTable;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl OutputError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// True when the file is missing or has no bytes.
fn needs_header(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

/// Open for appending, writing `header` first when the file is new or empty.
fn open_append(path: &Path, header: &[&str]) -> Result<File, OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;
    }

    let write_header = needs_header(path);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| OutputError::io(path, e))?;

    if write_header {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&file);
        writer
            .write_record(header)
            .map_err(|e| OutputError::csv(path, e))?;
        writer.flush().map_err(|e| OutputError::io(path, e))?;
    }
    Ok(file)
}

/// Replace the file with just the header line.
fn reset(path: &Path, header: &[&str]) -> Result<(), OutputError> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| OutputError::io(path, e))?;
    }
    open_append(path, header).map(|_| ())
}
