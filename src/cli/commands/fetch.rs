//! Fetch a page or a DuckDuckGo Lite result page as clean text.

use std::path::Path;

use anyhow::Context;
use console::style;
use serde::Serialize;

use crate::http_client::HttpClient;
use crate::search::{DuckDuckGoLiteProvider, QueryProvider, SearchConfig, SearchOptions};
use crate::utils::extract_text;

/// What to fetch.
pub enum FetchTarget {
    Url(String),
    SearchLite(String),
}

/// JSON printed by `sdscheck fetch`.
#[derive(Debug, Serialize)]
#[serde(tag = "source_type")]
enum FetchOutput {
    #[serde(rename = "url")]
    Url {
        source_value: String,
        extracted_text: String,
    },
    #[serde(rename = "duckduckgo_lite_search")]
    Search {
        query: String,
        region: String,
        extracted_text: String,
    },
}

/// Fetch, normalize and print. Fails without printing JSON when the request
/// does not succeed.
pub async fn cmd_fetch(
    config: &SearchConfig,
    target: FetchTarget,
    region: Option<String>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let client = HttpClient::builder(config.timeout())
        .user_agent(&config.user_agent)
        .build()
        .context("Failed to create HTTP client")?;
    let marker = config.result_marker.as_deref();

    let result = match target {
        FetchTarget::Url(url) => {
            let url = parse_page_url(&url)?;
            let response = client
                .get(&url)
                .await
                .with_context(|| format!("Error fetching URL {}", url))?;
            if !response.is_success() {
                anyhow::bail!("Error fetching URL {}: HTTP {}", url, response.status);
            }
            let html = response
                .text()
                .await
                .with_context(|| format!("Error reading response from {}", url))?;
            FetchOutput::Url {
                extracted_text: extract_text(&html, marker),
                source_value: url,
            }
        }
        FetchTarget::SearchLite(query) => {
            let region = region.unwrap_or_else(|| config.region.clone());
            let provider = DuckDuckGoLiteProvider::new(client);
            let options = SearchOptions {
                region: region.clone(),
                max_results: config.max_results,
            };
            let results = provider
                .search(&query, &options)
                .await
                .with_context(|| format!("Error searching DuckDuckGo Lite for \"{}\"", query))?;
            FetchOutput::Search {
                extracted_text: results.to_text(marker),
                query,
                region,
            }
        }
    };

    let json = to_json(&result)?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Saved JSON to {}", style("✓").green(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Only absolute http(s) URLs can be fetched.
fn parse_page_url(raw: &str) -> anyhow::Result<String> {
    let parsed = url::Url::parse(raw.trim()).with_context(|| format!("Invalid URL: {}", raw))?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim().to_string()),
        other => anyhow::bail!("Unsupported URL scheme '{}' in {}", other, raw),
    }
}

/// Pretty JSON with four-space indentation.
fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}
