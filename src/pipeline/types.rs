//! Pipeline events, per-document states and run summaries.

use chrono::{DateTime, Utc};

use crate::checkpoint::Stage;

/// Where a document ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentState {
    Pending,
    Stage1Done,
    Stage2Done,
    RowWritten,
    LoggedProcessed,
    /// A stage could not produce its fields; the row carries error markers.
    Failed { stage: Stage, reason: String },
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Enumeration finished.
    BatchStarted { total: usize },
    /// Work on a document began.
    DocumentStarted { index: usize, id: String },
    /// Already in the processed log.
    DocumentSkipped { id: String },
    /// Document could not be loaded; an empty row is written.
    DocumentInvalid { id: String, reason: String },
    /// A stage produced its fields.
    StageCompleted {
        id: String,
        stage: Stage,
        cached: bool,
    },
    /// Row and processed-log entry are on disk.
    DocumentFinished { id: String, state: DocumentState },
}

/// Result of one batch run.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Documents enumerated.
    pub total: usize,
    /// Rows written this run.
    pub processed: usize,
    /// Already logged, not touched.
    pub skipped: usize,
    /// Rows written for documents that failed to load.
    pub invalid: usize,
    /// Rows written with at least one failed stage.
    pub failed: usize,
    /// Stage-1 failures left out of the processed log for the next run.
    pub retry_pending: usize,
    /// Agent invocations made.
    pub agent_calls: usize,
}

impl BatchSummary {
    pub(crate) fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            total: 0,
            processed: 0,
            skipped: 0,
            invalid: 0,
            failed: 0,
            retry_pending: 0,
            agent_calls: 0,
        }
    }

    /// Documents still unprocessed because of the run limit.
    pub fn remaining(&self) -> usize {
        self.total
            .saturating_sub(self.processed)
            .saturating_sub(self.skipped)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
