//! Status command.

use console::style;

use crate::checkpoint::{CheckpointStore, FsCheckpointStore, Stage};
use crate::config::{Config, Settings};
use crate::output::ProcessedLog;
use crate::source::{DirectorySource, DocumentSource};

/// Show documents, processed count and checkpoint coverage.
///
/// Read-only: no file or directory is created or modified.
pub fn cmd_status(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    println!("{}", style("sdscheck status").bold());
    println!(
        "  {:<14} {}",
        "Documents:",
        settings.documents_dir.display()
    );
    println!("  {:<14} {}", "Results:", settings.output_csv.display());
    println!(
        "  {:<14} {}",
        "Checkpoints:",
        settings.checkpoint_dir.display()
    );
    println!(
        "  {:<14} {} ({})",
        "LLM:",
        config.llm.provider_name(),
        config.llm.model
    );
    println!("  {:<14} {}", "Search:", config.search.backend);
    println!();

    let source = DirectorySource::new(&settings.documents_dir, &settings.extensions);
    let docs = match source.enumerate() {
        Ok(docs) => docs,
        Err(e) => {
            println!("{} {}", style("!").yellow(), e);
            return Ok(());
        }
    };

    let logged = ProcessedLog::read_ids(&settings.processed_csv)?;
    let store = if settings.checkpoint_dir.is_dir() {
        let store = FsCheckpointStore::new(&settings.checkpoint_dir)?;
        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        store.register(&ids)?;
        Some(store)
    } else {
        None
    };

    let mut processed = 0;
    for doc in &docs {
        let done = logged.contains(&doc.id);
        if done {
            processed += 1;
        }
        let stages: Vec<String> = Stage::ALL
            .iter()
            .map(|&stage| {
                let present = store
                    .as_ref()
                    .is_some_and(|store| store.exists(&doc.id, stage));
                if present {
                    style(stage.number().to_string()).green().to_string()
                } else {
                    style("-".to_string()).dim().to_string()
                }
            })
            .collect();

        let mark = if done {
            style("✓").green()
        } else {
            style("·").dim()
        };
        println!("  {} [{}] {}", mark, stages.join(""), doc.id);
    }

    println!();
    println!(
        "{} {}/{} documents processed",
        style("→").cyan(),
        processed,
        docs.len()
    );
    Ok(())
}
