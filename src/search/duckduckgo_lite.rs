//! DuckDuckGo Lite backend.
//!
//! Posts the query to the lite endpoint and returns the raw result page; the
//! caller normalizes it.

use async_trait::async_trait;
use tracing::debug;

use super::{QueryProvider, SearchError, SearchOptions, SearchResults};
use crate::http_client::HttpClient;

/// DuckDuckGo Lite search URL.
const DDG_LITE_URL: &str = "https://lite.duckduckgo.com/lite";

/// Query provider backed by DuckDuckGo Lite markup.
pub struct DuckDuckGoLiteProvider {
    client: HttpClient,
}

impl DuckDuckGoLiteProvider {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryProvider for DuckDuckGoLiteProvider {
    fn name(&self) -> &str {
        "duckduckgo-lite"
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, SearchError> {
        debug!(
            "DuckDuckGo Lite search: \"{}\" (region {})",
            query, options.region
        );

        let response = self
            .client
            .post_form(
                DDG_LITE_URL,
                &[("q", query)],
                &[("kl", options.region.as_str())],
            )
            .await?;

        if !response.is_success() {
            return Err(SearchError::Status {
                backend: self.name().to_string(),
                status: response.status.as_u16(),
            });
        }

        let html = response.text().await?;
        Ok(SearchResults::Markup(html))
    }
}
