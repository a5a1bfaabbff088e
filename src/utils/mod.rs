//! Shared utility functions.
//!
//! - `html`: markup normalization and marker truncation
//! - `text`: UTF-8 safe truncation and single-line escaping

pub mod html;
mod text;

pub use html::{extract_text, normalize, truncate_from_marker, DEFAULT_RESULT_MARKER};
pub use text::{escape_newlines, truncate_utf8};
