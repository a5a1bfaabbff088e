//! Query providers.
//!
//! A query provider takes a query string and returns raw result content from
//! one external search backend. Callers go through [`QueryProvider`] and never
//! assume which backend is active.

mod config;
mod duckduckgo;
mod duckduckgo_lite;
mod google;
mod query;

pub use config::SearchConfig;
pub use duckduckgo::DuckDuckGoProvider;
pub use duckduckgo_lite::DuckDuckGoLiteProvider;
pub use google::GoogleProvider;
pub use query::QueryBuilder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::http_client::HttpClient;
use crate::utils::extract_text;

/// Errors raised by query providers. Providers never retry.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{backend} returned HTTP {status}")]
    Status { backend: String, status: u16 },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Per-call search options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Search-locale hint.
    pub region: String,
    /// Cap on returned items.
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            region: config::default_region(),
            max_results: 3,
        }
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            region: config.region.clone(),
            max_results: config.max_results,
        }
    }
}

/// A single itemized search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Raw content returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResults {
    /// Result page markup that still needs normalizing.
    Markup(String),
    /// Already itemized results.
    Items(Vec<SearchItem>),
}

impl SearchResults {
    /// Render results as plain text for the extraction agent.
    ///
    /// Markup is normalized and cut at `marker` when one is given; items are
    /// rendered as `title - url` followed by the snippet, blank-line separated.
    pub fn to_text(&self, marker: Option<&str>) -> String {
        match self {
            SearchResults::Markup(html) => extract_text(html, marker),
            SearchResults::Items(items) => items
                .iter()
                .map(|item| {
                    if item.snippet.is_empty() {
                        format!("{} - {}", item.title, item.url)
                    } else {
                        format!("{} - {}\n{}", item.title, item.url, item.snippet)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// True when the backend returned nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            SearchResults::Markup(html) => html.trim().is_empty(),
            SearchResults::Items(items) => items.is_empty(),
        }
    }
}

/// Contract shared by every search backend.
#[async_trait]
pub trait QueryProvider: Send + Sync {
    /// Backend name used in config and logs.
    fn name(&self) -> &str;

    /// Run one search.
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, SearchError>;
}

/// Names accepted by [`create_query_provider`].
pub const AVAILABLE_BACKENDS: &[&str] = &["duckduckgo-lite", "duckduckgo", "google"];

/// Create a query provider by backend name.
pub fn create_query_provider(
    config: &SearchConfig,
    client: HttpClient,
) -> Result<Arc<dyn QueryProvider>, SearchError> {
    match config.backend.to_lowercase().as_str() {
        "duckduckgo-lite" | "ddg-lite" | "lite" => Ok(Arc::new(DuckDuckGoLiteProvider::new(client))),
        "duckduckgo" | "ddg" => Ok(Arc::new(DuckDuckGoProvider::new(client))),
        "google" => {
            let api_key = config.google_api_key.clone().ok_or_else(|| {
                SearchError::Config("Google search requires GOOGLE_API_KEY".to_string())
            })?;
            let cse_id = config.google_cse_id.clone().ok_or_else(|| {
                SearchError::Config("Google search requires GOOGLE_CSE_ID".to_string())
            })?;
            Ok(Arc::new(GoogleProvider::new(client, api_key, cse_id)))
        }
        other => Err(SearchError::Config(format!(
            "Unknown search backend: {}. Available: {}",
            other,
            AVAILABLE_BACKENDS.join(", ")
        ))),
    }
}
