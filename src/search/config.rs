//! Search backend configuration.

use serde::{Deserialize, Serialize};

use crate::utils::DEFAULT_RESULT_MARKER;

/// Configuration for the query provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Backend name: "duckduckgo-lite", "duckduckgo" or "google"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Search locale hint (DuckDuckGo `kl` code, e.g. "wt-wt", "dk-da")
    #[serde(default = "default_region")]
    pub region: String,
    /// Cap on returned items for itemized backends
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent ("impersonate" picks a real browser string)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Marker that anchors the useful part of lite result pages
    #[serde(default = "default_result_marker")]
    pub result_marker: Option<String>,
    /// Google Custom Search API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,
    /// Google Custom Search engine id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_cse_id: Option<String>,
}

fn default_backend() -> String {
    "duckduckgo-lite".to_string()
}

pub(crate) fn default_region() -> String {
    "wt-wt".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "impersonate".to_string()
}

fn default_result_marker() -> Option<String> {
    Some(DEFAULT_RESULT_MARKER.to_string())
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            region: default_region(),
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            result_marker: default_result_marker(),
            google_api_key: None,
            google_cse_id: None,
        }
    }
}

impl SearchConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `SEARCH_BACKEND`: backend name
    /// - `SEARCH_REGION`: locale hint
    /// - `GOOGLE_API_KEY` / `GOOGLE_CSE_ID`: Google Custom Search credentials
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("SEARCH_BACKEND") {
            self.backend = val;
        }
        if let Ok(val) = std::env::var("SEARCH_REGION") {
            self.region = val;
        }
        if self.google_api_key.is_none() {
            self.google_api_key = std::env::var("GOOGLE_API_KEY").ok();
        }
        if self.google_cse_id.is_none() {
            self.google_cse_id = std::env::var("GOOGLE_CSE_ID").ok();
        }
        self
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}
