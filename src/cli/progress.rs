//! Progress display for batch runs.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::{DocumentState, PipelineEvent};

/// Progress bar driven by pipeline events.
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Self { bar }
    }

    /// Update the display for one event.
    pub fn handle(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::BatchStarted { total } => {
                self.bar.set_length(*total as u64);
            }
            PipelineEvent::DocumentStarted { id, .. } => {
                self.bar.set_message(id.clone());
            }
            PipelineEvent::DocumentSkipped { .. } => {
                self.bar.inc(1);
            }
            PipelineEvent::DocumentInvalid { id, reason } => {
                self.bar.println(format!(
                    "{} {} could not be loaded: {}",
                    style("!").yellow(),
                    id,
                    reason
                ));
            }
            PipelineEvent::StageCompleted { id, stage, cached } => {
                let how = if *cached { "checkpoint" } else { "agent" };
                self.bar.set_message(format!("{} ({} via {})", id, stage, how));
            }
            PipelineEvent::DocumentFinished { id, state } => {
                match state {
                    DocumentState::Failed { stage, reason } => {
                        self.bar.println(format!(
                            "{} {} failed at {}: {}",
                            style("✗").red(),
                            id,
                            stage,
                            reason
                        ));
                    }
                    _ => {
                        self.bar.println(format!("{} {}", style("✓").green(), id));
                    }
                }
                self.bar.inc(1);
            }
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
