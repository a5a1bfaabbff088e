//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod fetch;
mod run_cmd;
mod search;
mod status;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "sdscheck")]
#[command(about = "Safety data sheet extraction and latest-version lookup")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery of sdscheck.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL or run a DuckDuckGo Lite search and print the page text as JSON
    #[command(group(clap::ArgGroup::new("input").required(true).args(["url", "search_lite"])))]
    Fetch {
        /// URL to fetch
        #[arg(long)]
        url: Option<String>,
        /// Query to search on DuckDuckGo Lite
        #[arg(long)]
        search_lite: Option<String>,
        /// Search region (e.g. "wt-wt", "us-en", "dk-da")
        #[arg(long)]
        region: Option<String>,
        /// Write the JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a web search with any backend and print the results as text
    Search {
        /// Search query
        query: String,
        /// Search backend (duckduckgo-lite, duckduckgo, google)
        #[arg(short, long)]
        backend: Option<String>,
        /// Search region
        #[arg(long)]
        region: Option<String>,
        /// Maximum results for itemized backends
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },

    /// Process safety data sheets: extract fields, look up the newest version, write CSV rows
    Run {
        /// Process a single file instead of the documents directory
        #[arg(short, long, conflicts_with = "dir")]
        file: Option<PathBuf>,
        /// Documents directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Result table CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Processed log CSV
        #[arg(long)]
        processed: Option<PathBuf>,
        /// Checkpoint directory
        #[arg(long)]
        checkpoints: Option<PathBuf>,
        /// Search backend (duckduckgo-lite, duckduckgo, google)
        #[arg(short, long)]
        backend: Option<String>,
        /// Limit number of documents to process (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Truncate the result table and processed log and rebuild from checkpoints
        #[arg(long)]
        rebuild: bool,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show documents, processed count and checkpoint coverage
    Status,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        search_dir: None,
    };
    let (mut settings, mut config) = load_settings_with_options(options)
        .await
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Fetch {
            url,
            search_lite,
            region,
            output,
        } => {
            let target = match (url, search_lite) {
                (Some(url), _) => fetch::FetchTarget::Url(url),
                (None, Some(query)) => fetch::FetchTarget::SearchLite(query),
                (None, None) => anyhow::bail!("Either --url or --search-lite is required"),
            };
            fetch::cmd_fetch(&config.search, target, region, output.as_deref()).await
        }
        Commands::Search {
            query,
            backend,
            region,
            max_results,
        } => {
            if let Some(backend) = backend {
                config.search.backend = backend;
            }
            if let Some(region) = region {
                config.search.region = region;
            }
            if let Some(max) = max_results {
                config.search.max_results = max;
            }
            search::cmd_search(&config.search, &query).await
        }
        Commands::Run {
            file,
            dir,
            output,
            processed,
            checkpoints,
            backend,
            limit,
            rebuild,
            no_progress,
        } => {
            if let Some(dir) = dir {
                settings.documents_dir = dir;
            }
            if let Some(output) = output {
                settings.output_csv = output;
            }
            if let Some(processed) = processed {
                settings.processed_csv = processed;
            }
            if let Some(checkpoints) = checkpoints {
                settings.checkpoint_dir = checkpoints;
            }
            if let Some(backend) = backend {
                config.search.backend = backend;
            }
            let limit = if limit > 0 { Some(limit) } else { None };
            run_cmd::cmd_run(
                &settings,
                &config,
                run_cmd::RunFlags {
                    file,
                    limit,
                    rebuild,
                    show_progress: !no_progress,
                },
            )
            .await
        }
        Commands::Status => status::cmd_status(&settings, &config),
    }
}
