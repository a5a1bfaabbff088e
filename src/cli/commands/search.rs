//! Search command.

use anyhow::Context;
use console::style;

use crate::http_client::HttpClient;
use crate::search::{create_query_provider, SearchConfig, SearchOptions};

/// Run one search and print the rendered results.
pub async fn cmd_search(config: &SearchConfig, query: &str) -> anyhow::Result<()> {
    let client = HttpClient::builder(config.timeout())
        .user_agent(&config.user_agent)
        .build()
        .context("Failed to create HTTP client")?;
    let provider = create_query_provider(config, client)?;

    eprintln!(
        "{} Searching {} for \"{}\"",
        style("→").cyan(),
        provider.name(),
        query
    );

    let results = provider
        .search(query, &SearchOptions::from(config))
        .await
        .with_context(|| format!("Search failed for \"{}\"", query))?;

    let text = results.to_text(config.result_marker.as_deref());
    if text.is_empty() {
        eprintln!("{} No results", style("!").yellow());
    } else {
        println!("{}", text);
    }
    Ok(())
}
