//! sdscheck - safety data sheet extraction and latest-version lookup.
//!
//! Extracts product fields from SDS documents with an LLM, searches the web
//! for the newest version of each sheet and writes one CSV row per document.
//! Runs resume from per-stage checkpoints.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod http_client;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod search;
pub mod source;
pub mod utils;
