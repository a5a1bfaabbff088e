//! Text extraction by file type.

use std::path::Path;

use tracing::debug;

use super::LoadError;
use crate::utils::normalize;

/// Read a file's text: PDFs through `pdf-extract`, HTML through the
/// normalizer, anything else as UTF-8.
pub fn load_text(path: &Path) -> Result<String, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => extract_pdf_text(path, &bytes),
        "html" | "htm" => {
            let text = decode_utf8(path, bytes)?;
            Ok(normalize(&text))
        }
        _ => decode_utf8(path, bytes),
    }
}

fn decode_utf8(path: &Path, bytes: Vec<u8>) -> Result<String, LoadError> {
    String::from_utf8(bytes).map_err(|_| LoadError::Encoding {
        path: path.to_path_buf(),
    })
}

/// pdf-extract panics on some malformed files, so the call is isolated.
fn extract_pdf_text(path: &Path, bytes: &[u8]) -> Result<String, LoadError> {
    let pdf_err = |reason: String| LoadError::Pdf {
        path: path.to_path_buf(),
        reason,
    };

    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| pdf_err("PDF parser panicked".to_string()))?;
    let text = result.map_err(|e| pdf_err(e.to_string()))?;

    debug!("Extracted {} chars from {}", text.len(), path.display());
    Ok(text)
}
