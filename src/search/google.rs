//! Google Custom Search backend.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{QueryProvider, SearchError, SearchItem, SearchOptions, SearchResults};
use crate::http_client::HttpClient;

const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// The API returns at most ten items per request.
const MAX_PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Query provider backed by the Google Custom Search JSON API.
pub struct GoogleProvider {
    client: HttpClient,
    api_key: String,
    cse_id: String,
}

impl GoogleProvider {
    pub fn new(client: HttpClient, api_key: String, cse_id: String) -> Self {
        Self {
            client,
            api_key,
            cse_id,
        }
    }
}

/// Map a DuckDuckGo-style region ("dk-da") to a Google country code ("dk").
///
/// The neutral "wt-wt" region and malformed codes map to no restriction.
fn country_code(region: &str) -> Option<&str> {
    let country = region.split('-').next()?;
    if country.len() == 2 && !country.eq_ignore_ascii_case("wt") {
        Some(country)
    } else {
        None
    }
}

#[async_trait]
impl QueryProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, SearchError> {
        debug!("Google search: {}", query);

        let num = options.max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("key", self.api_key.as_str()),
            ("cx", self.cse_id.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ];
        if let Some(gl) = country_code(&options.region) {
            params.push(("gl", gl));
        }

        let response = self.client.get_with_query(GOOGLE_SEARCH_URL, &params).await?;

        if !response.is_success() {
            return Err(SearchError::Status {
                backend: self.name().to_string(),
                status: response.status.as_u16(),
            });
        }

        let body: GoogleResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        let items = body
            .items
            .into_iter()
            .map(|item| SearchItem {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
            })
            .collect();

        Ok(SearchResults::Items(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_to_country() {
        assert_eq!(country_code("dk-da"), Some("dk"));
        assert_eq!(country_code("us-en"), Some("us"));
        assert_eq!(country_code("wt-wt"), None);
        assert_eq!(country_code(""), None);
    }

    #[test]
    fn response_without_items() {
        let body: GoogleResponse = serde_json::from_str(r#"{"kind":"customsearch#search"}"#).unwrap();
        assert!(body.items.is_empty());
    }
}
