//! Batch pipeline.
//!
//! Walks the documents of a source in order and, for each one, extracts the
//! product fields (stage 1), looks up the newest SDS on the web (stage 2),
//! appends a result row and marks the document as processed. Stage outputs
//! are checkpointed so an interrupted run resumes without repeating agent
//! calls. Progress is reported through events; rendering them is up to the
//! caller.

mod context;
mod types;

pub use context::AgentContext;
pub use types::{BatchSummary, DocumentState, PipelineEvent};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointError, CheckpointStore, Stage};
use crate::llm::{ExtractionAgent, StagePrompts};
use crate::output::{OutputError, ProcessedLog, ResultTable};
use crate::records::{
    error_marker, parse_fields, CheckpointPayload, ExtractionRecord, FieldSet, ProductInfo,
    ResultRow, SdsLookup,
};
use crate::search::{QueryProvider, SearchOptions};
use crate::source::{Document, DocumentRef, DocumentSource, LoadError};

/// Text handed to the agent when a search returns nothing.
const NO_RESULTS_PLACEHOLDER: &str = "(no search results)";

/// Errors that abort a batch. Per-document failures never do.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to enumerate documents: {0}")]
    Source(#[from] LoadError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Run options.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub search: SearchOptions,
    /// Marker used to cut markup search results.
    pub result_marker: Option<String>,
    /// Upper bound for one agent call.
    pub agent_timeout: Duration,
    /// Maximum documents to process this run.
    pub limit: Option<usize>,
    /// Truncate the result table and processed log, then rebuild every row.
    pub rebuild: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            result_marker: Some(crate::utils::DEFAULT_RESULT_MARKER.to_string()),
            agent_timeout: Duration::from_secs(30),
            limit: None,
            rebuild: false,
        }
    }
}

/// Outcome of one stage.
enum StageOutcome<T> {
    Done { fields: T, cached: bool },
    Failed { fields: T, reason: String },
}

/// Outcome of one document.
struct DocumentOutcome {
    row: ResultRow,
    /// `Stage2Done` or `Failed`.
    state: DocumentState,
    invalid: bool,
    agent_calls: usize,
}

/// Sequential two-stage pipeline over a document source.
pub struct BatchPipeline {
    source: Arc<dyn DocumentSource>,
    agent: Arc<dyn ExtractionAgent>,
    search: Arc<dyn QueryProvider>,
    checkpoints: Arc<dyn CheckpointStore>,
    prompts: StagePrompts,
    options: PipelineOptions,
}

impl BatchPipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        agent: Arc<dyn ExtractionAgent>,
        search: Arc<dyn QueryProvider>,
        checkpoints: Arc<dyn CheckpointStore>,
        prompts: StagePrompts,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source,
            agent,
            search,
            checkpoints,
            prompts,
            options,
        }
    }

    /// Process every unlogged document.
    ///
    /// Rows and log entries are appended in enumeration order. A document
    /// whose stage 1 failed keeps its row but stays out of the processed log,
    /// so the next run retries it and replaces that row. Only setup and
    /// output failures end the run early.
    pub async fn run(
        &self,
        table: &ResultTable,
        log: &mut ProcessedLog,
        event_tx: mpsc::Sender<PipelineEvent>,
    ) -> Result<BatchSummary, PipelineError> {
        let mut summary = BatchSummary::start();

        if self.options.rebuild {
            info!("Rebuilding result table from checkpoints");
            table.truncate()?;
            log.truncate()?;
        }

        let docs = self.source.enumerate()?;
        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        self.checkpoints.register(&ids)?;
        let mut with_rows = table.documents()?;
        summary.total = docs.len();
        info!("Processing {} documents", docs.len());
        let _ = event_tx
            .send(PipelineEvent::BatchStarted { total: docs.len() })
            .await;

        for (index, doc_ref) in docs.iter().enumerate() {
            if log.contains(&doc_ref.id) {
                debug!("Skipping {} (already processed)", doc_ref.id);
                summary.skipped += 1;
                let _ = event_tx
                    .send(PipelineEvent::DocumentSkipped {
                        id: doc_ref.id.clone(),
                    })
                    .await;
                continue;
            }

            if let Some(limit) = self.options.limit {
                if summary.processed >= limit {
                    info!("Reached limit of {} documents", limit);
                    break;
                }
            }

            let _ = event_tx
                .send(PipelineEvent::DocumentStarted {
                    index,
                    id: doc_ref.id.clone(),
                })
                .await;

            let outcome = self.process_document(doc_ref, &event_tx).await?;
            summary.agent_calls += outcome.agent_calls;

            let mut state = outcome.state;
            let failed = matches!(state, DocumentState::Failed { .. });
            let retry_later = !outcome.invalid
                && matches!(
                    state,
                    DocumentState::Failed {
                        stage: Stage::Extraction,
                        ..
                    }
                );

            if with_rows.contains(&doc_ref.id) {
                table.replace(&outcome.row)?;
            } else {
                table.append(&outcome.row)?;
                with_rows.insert(doc_ref.id.clone());
            }
            if !failed {
                state = DocumentState::RowWritten;
                debug!("{} is {:?}", doc_ref.id, state);
            }
            if retry_later {
                info!("{} will be retried on the next run", doc_ref.id);
                summary.retry_pending += 1;
            } else {
                log.append(&doc_ref.id)?;
            }
            if !failed {
                state = DocumentState::LoggedProcessed;
            }
            summary.processed += 1;

            if outcome.invalid {
                summary.invalid += 1;
            } else if failed {
                summary.failed += 1;
            }
            let _ = event_tx
                .send(PipelineEvent::DocumentFinished {
                    id: doc_ref.id.clone(),
                    state,
                })
                .await;
        }

        summary.finished_at = Utc::now();
        info!(
            "Batch finished: {} processed, {} skipped, {} failed, {} agent calls",
            summary.processed, summary.skipped, summary.failed, summary.agent_calls
        );
        Ok(summary)
    }

    async fn process_document(
        &self,
        doc_ref: &DocumentRef,
        event_tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<DocumentOutcome, PipelineError> {
        let id = doc_ref.id.as_str();

        let doc = match self.source.load(doc_ref) {
            Ok(doc) if doc.valid => doc,
            Ok(_) => return Ok(self.invalid_outcome(id, "no text content", event_tx).await),
            Err(e) => return Ok(self.invalid_outcome(id, &e.to_string(), event_tx).await),
        };

        let mut ctx = AgentContext::new(
            self.agent.as_ref(),
            &self.prompts.system,
            self.options.agent_timeout,
        );
        debug!("{} is {:?}", id, DocumentState::Pending);
        let state;

        let (product, lookup) = match self.extract_product(&mut ctx, &doc).await? {
            StageOutcome::Done { fields, cached } => {
                debug!("{} is {:?}", id, DocumentState::Stage1Done);
                self.stage_completed(id, Stage::Extraction, cached, event_tx)
                    .await;

                match self.lookup_latest(&mut ctx, id, &fields).await? {
                    StageOutcome::Done {
                        fields: lookup,
                        cached,
                    } => {
                        state = DocumentState::Stage2Done;
                        self.stage_completed(id, Stage::Verification, cached, event_tx)
                            .await;
                        (fields, lookup)
                    }
                    StageOutcome::Failed {
                        fields: lookup,
                        reason,
                    } => {
                        warn!("Stage 2 failed for {}: {}", id, reason);
                        state = DocumentState::Failed {
                            stage: Stage::Verification,
                            reason,
                        };
                        (fields, lookup)
                    }
                }
            }
            StageOutcome::Failed { fields, reason } => {
                warn!("Stage 1 failed for {}: {}", id, reason);
                let lookup = SdsLookup::failed("stage 1 failed");
                state = DocumentState::Failed {
                    stage: Stage::Extraction,
                    reason,
                };
                (fields, lookup)
            }
        };

        debug!("{} is {:?}", id, state);
        let agent_calls = ctx.calls();
        drop(ctx);

        Ok(DocumentOutcome {
            row: ResultRow::new(id, &product, &lookup),
            state,
            invalid: false,
            agent_calls,
        })
    }

    async fn invalid_outcome(
        &self,
        id: &str,
        reason: &str,
        event_tx: &mpsc::Sender<PipelineEvent>,
    ) -> DocumentOutcome {
        warn!("Could not load {}: {}", id, reason);
        let _ = event_tx
            .send(PipelineEvent::DocumentInvalid {
                id: id.to_string(),
                reason: reason.to_string(),
            })
            .await;
        DocumentOutcome {
            row: ResultRow::empty(id),
            state: DocumentState::Failed {
                stage: Stage::Extraction,
                reason: reason.to_string(),
            },
            invalid: true,
            agent_calls: 0,
        }
    }

    async fn stage_completed(
        &self,
        id: &str,
        stage: Stage,
        cached: bool,
        event_tx: &mpsc::Sender<PipelineEvent>,
    ) {
        let _ = event_tx
            .send(PipelineEvent::StageCompleted {
                id: id.to_string(),
                stage,
                cached,
            })
            .await;
    }

    /// Stored record for a stage, or `None` when it must be recomputed.
    fn cached<T: FieldSet>(&self, id: &str, stage: Stage) -> Option<ExtractionRecord<T>> {
        let stored = match self.checkpoints.read(id, stage) {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                warn!("Ignoring unreadable {} checkpoint for {}: {}", stage, id, e);
                return None;
            }
        };

        match CheckpointPayload::decode::<T>(&stored, stage.number()) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Recomputing {} for {}: {}", stage, id, e);
                None
            }
        }
    }

    fn persist<T: FieldSet>(
        &self,
        id: &str,
        stage: Stage,
        output: &str,
        fields: Option<&T>,
    ) -> Result<(), PipelineError> {
        let payload = CheckpointPayload::encode(stage.number(), output, fields);
        self.checkpoints.write(id, stage, &payload)?;
        Ok(())
    }

    /// Stage 1: product fields from the document text.
    async fn extract_product(
        &self,
        ctx: &mut AgentContext<'_>,
        doc: &Document,
    ) -> Result<StageOutcome<ProductInfo>, PipelineError> {
        let task = self.prompts.render_extraction(&doc.content);

        if let Some(record) = self.cached::<ProductInfo>(&doc.id, Stage::Extraction) {
            debug!("Using stage 1 checkpoint for {}", doc.id);
            ctx.remember(task, record.output);
            return Ok(StageOutcome::Done {
                fields: record.fields,
                cached: true,
            });
        }

        info!("Extracting product fields from {}", doc.id);
        let output = match ctx.ask(task).await {
            Ok(output) => output,
            Err(e) => {
                // Not persisted: agent failures in stage 1 are retried next run.
                let reason = e.to_string();
                return Ok(StageOutcome::Failed {
                    fields: ProductInfo::filled(&error_marker(&reason)),
                    reason,
                });
            }
        };

        match parse_fields::<ProductInfo>(&output, false) {
            Ok(fields) => {
                self.persist(&doc.id, Stage::Extraction, &output, Some(&fields))?;
                Ok(StageOutcome::Done {
                    fields,
                    cached: false,
                })
            }
            Err(e) => {
                self.persist::<ProductInfo>(&doc.id, Stage::Extraction, &output, None)?;
                let reason = format!("unparseable stage 1 output: {}", e);
                Ok(StageOutcome::Failed {
                    fields: ProductInfo::filled(&error_marker(&reason)),
                    reason,
                })
            }
        }
    }

    /// Stage 2: newest SDS from web search results.
    ///
    /// Every failure is persisted as an error-marker record so it is not
    /// retried on later runs.
    async fn lookup_latest(
        &self,
        ctx: &mut AgentContext<'_>,
        id: &str,
        product: &ProductInfo,
    ) -> Result<StageOutcome<SdsLookup>, PipelineError> {
        if let Some(record) = self.cached::<SdsLookup>(id, Stage::Verification) {
            debug!("Using stage 2 checkpoint for {}", id);
            return Ok(StageOutcome::Done {
                fields: record.fields,
                cached: true,
            });
        }

        let Some(query) = product.lookup_query() else {
            return self.lookup_failed(id, "", "no product name, code or UFI to search for");
        };

        info!("Searching {} for \"{}\"", self.search.name(), query);
        let results = match self.search.search(&query, &self.options.search).await {
            Ok(results) => results,
            Err(e) => return self.lookup_failed(id, "", &format!("search failed: {}", e)),
        };

        let mut text = results.to_text(self.options.result_marker.as_deref());
        if results.is_empty() {
            debug!("No search results for {}", id);
            text = NO_RESULTS_PLACEHOLDER.to_string();
        } else if text.trim().is_empty() {
            debug!("Nothing after the result marker for {}", id);
            text = NO_RESULTS_PLACEHOLDER.to_string();
        }

        let task = self
            .prompts
            .render_verification(&product.to_prompt_json(), &query, &text);
        let output = match ctx.ask(task).await {
            Ok(output) => output,
            Err(e) => return self.lookup_failed(id, "", &e.to_string()),
        };

        match parse_fields::<SdsLookup>(&output, false) {
            Ok(fields) => {
                self.persist(id, Stage::Verification, &output, Some(&fields))?;
                Ok(StageOutcome::Done {
                    fields,
                    cached: false,
                })
            }
            Err(e) => self.lookup_failed(id, &output, &format!("unparseable stage 2 output: {}", e)),
        }
    }

    fn lookup_failed(
        &self,
        id: &str,
        output: &str,
        reason: &str,
    ) -> Result<StageOutcome<SdsLookup>, PipelineError> {
        let fields = SdsLookup::failed(reason);
        self.persist(id, Stage::Verification, output, Some(&fields))?;
        Ok(StageOutcome::Failed {
            fields,
            reason: reason.to_string(),
        })
    }
}
