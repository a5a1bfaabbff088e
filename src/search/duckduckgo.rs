//! DuckDuckGo HTML backend.
//!
//! Uses the HTML endpoint and itemizes the result list.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::{QueryProvider, SearchError, SearchItem, SearchOptions, SearchResults};
use crate::http_client::HttpClient;

/// DuckDuckGo search URL.
const DDG_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Query provider returning itemized DuckDuckGo results.
pub struct DuckDuckGoProvider {
    client: HttpClient,
}

impl DuckDuckGoProvider {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Parse search results from HTML.
    fn parse_results(&self, html: &str, max_results: usize) -> Result<Vec<SearchItem>, SearchError> {
        let document = Html::parse_document(html);

        let result_selector = Selector::parse("div.result")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {:?}", e)))?;
        let link_selector = Selector::parse("a.result__a")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {:?}", e)))?;
        let snippet_selector = Selector::parse(".result__snippet")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {:?}", e)))?;

        let mut results = Vec::new();

        for result in document.select(&result_selector) {
            let Some(link) = result.select(&link_selector).next() else {
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(|h| self.extract_url(h)) else {
                continue;
            };

            let title = collapse_text(link.text());
            let snippet = result
                .select(&snippet_selector)
                .next()
                .map(|s| collapse_text(s.text()))
                .unwrap_or_default();

            results.push(SearchItem {
                url,
                title,
                snippet,
            });

            if max_results > 0 && results.len() >= max_results {
                break;
            }
        }

        debug!("Parsed {} results from DuckDuckGo", results.len());
        Ok(results)
    }

    /// Extract the actual URL from DuckDuckGo's redirect URL.
    fn extract_url(&self, href: &str) -> Option<String> {
        if href.starts_with("//duckduckgo.com/l/") || href.starts_with("/l/") {
            // Redirect: //duckduckgo.com/l/?uddg=<encoded_url>&...
            let uddg_start = href.find("uddg=")?;
            let encoded = &href[uddg_start + 5..];
            let end = encoded.find('&').unwrap_or(encoded.len());

            urlencoding::decode(&encoded[..end])
                .ok()
                .map(|s| s.into_owned())
        } else if href.starts_with("http://") || href.starts_with("https://") {
            Some(href.to_string())
        } else if href.starts_with("//") {
            Some(format!("https:{}", href))
        } else {
            None
        }
    }
}

fn collapse_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl QueryProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, SearchError> {
        debug!("DuckDuckGo search: {}", query);

        let response = self
            .client
            .post_form(
                DDG_SEARCH_URL,
                &[("q", query), ("kl", options.region.as_str())],
                &[],
            )
            .await?;

        if !response.is_success() {
            return Err(SearchError::Status {
                backend: self.name().to_string(),
                status: response.status.as_u16(),
            });
        }

        let html = response.text().await?;
        let items = self.parse_results(&html, options.max_results)?;
        Ok(SearchResults::Items(items))
    }
}
