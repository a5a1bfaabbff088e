//! Batch run command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tokio::sync::mpsc;

use crate::checkpoint::FsCheckpointStore;
use crate::cli::progress::BatchProgress;
use crate::config::{Config, Settings};
use crate::http_client::HttpClient;
use crate::llm::{LlmClient, StagePrompts};
use crate::output::{ProcessedLog, ResultTable};
use crate::pipeline::{BatchPipeline, PipelineEvent, PipelineOptions};
use crate::search::{create_query_provider, SearchOptions};
use crate::source::{DirectorySource, DocumentSource, SingleFileSource};

/// Flags that only affect a single run.
pub struct RunFlags {
    pub file: Option<PathBuf>,
    pub limit: Option<usize>,
    pub rebuild: bool,
    pub show_progress: bool,
}

/// Process the configured documents.
pub async fn cmd_run(settings: &Settings, config: &Config, flags: RunFlags) -> anyhow::Result<()> {
    settings
        .ensure_directories()
        .context("Failed to create output directories")?;

    let source: Arc<dyn DocumentSource> = match flags.file {
        Some(ref file) => Arc::new(SingleFileSource::new(file)),
        None => Arc::new(DirectorySource::new(
            &settings.documents_dir,
            &settings.extensions,
        )),
    };

    let client = HttpClient::builder(config.search.timeout())
        .user_agent(&config.search.user_agent)
        .build()
        .context("Failed to create HTTP client")?;
    let search = create_query_provider(&config.search, client)?;
    let agent = Arc::new(LlmClient::new(config.llm.clone())?);
    let checkpoints = Arc::new(
        FsCheckpointStore::new(&settings.checkpoint_dir)
            .context("Failed to open checkpoint directory")?,
    );

    let table = ResultTable::open(&settings.output_csv)
        .with_context(|| format!("Cannot open {}", settings.output_csv.display()))?;
    let mut log = ProcessedLog::open(&settings.processed_csv)
        .with_context(|| format!("Cannot open {}", settings.processed_csv.display()))?;

    println!(
        "{} Using {} ({}) with {} search",
        style("→").cyan(),
        config.llm.provider_name(),
        config.llm.model,
        search.name()
    );

    let pipeline = BatchPipeline::new(
        source,
        agent,
        search,
        checkpoints,
        StagePrompts::from_config(&config.llm),
        PipelineOptions {
            search: SearchOptions::from(&config.search),
            result_marker: config.search.result_marker.clone(),
            agent_timeout: config.llm.timeout(),
            limit: flags.limit,
            rebuild: flags.rebuild,
        },
    );

    let (event_tx, mut event_rx) = mpsc::channel::<PipelineEvent>(100);
    let show_progress = flags.show_progress;
    let event_handler = tokio::spawn(async move {
        let progress = show_progress.then(BatchProgress::new);
        while let Some(event) = event_rx.recv().await {
            if let Some(ref progress) = progress {
                progress.handle(&event);
            }
        }
        if let Some(ref progress) = progress {
            progress.finish();
        }
    });

    let result = pipeline.run(&table, &mut log, event_tx).await;

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }

    let summary = result.context("Batch run failed")?;

    println!(
        "{} Processed {} documents in {}s ({} agent calls)",
        style("✓").green(),
        summary.processed,
        summary.elapsed().num_seconds(),
        summary.agent_calls
    );
    if summary.skipped > 0 {
        println!(
            "  {} {} already processed",
            style("→").dim(),
            summary.skipped
        );
    }
    if summary.invalid > 0 {
        println!(
            "  {} {} could not be loaded (empty rows written)",
            style("!").yellow(),
            summary.invalid
        );
    }
    if summary.failed > 0 {
        println!(
            "  {} {} with error markers",
            style("✗").red(),
            summary.failed
        );
    }
    if summary.retry_pending > 0 {
        println!(
            "  {} {} will be retried on the next run",
            style("→").dim(),
            summary.retry_pending
        );
    }
    if summary.remaining() > 0 {
        println!(
            "  {} {} documents still pending",
            style("!").yellow(),
            summary.remaining()
        );
    }
    println!(
        "  {} Results in {}",
        style("→").dim(),
        table.path().display()
    );

    Ok(())
}
