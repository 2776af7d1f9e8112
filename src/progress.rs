//! Console progress for single-identifier runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::archiver::{JobOutcome, Stage, StageObserver};
use crate::identifier::VideoId;

const RUNNING_TEMPLATE: &str = "{spinner:.green} {msg:.green}";
const DONE_TEMPLATE: &str = "{msg:.cyan}";
const FAILED_TEMPLATE: &str = "{msg:.red}";

/// Announces each stage with a spinner; completed stages stay on screen.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(style(RUNNING_TEMPLATE));
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl StageObserver for ConsoleProgress {
    fn stage_started(&self, id: &VideoId, stage: Stage) {
        if matches!(stage, Stage::PresenceCheck | Stage::PathAllocation | Stage::Done) {
            return;
        }
        let message = self.bar.message();
        if !message.is_empty() {
            self.bar.println(format!("  {message}"));
        }
        self.bar.set_message(stage.announcement(id));
    }

    fn finished(&self, id: &VideoId, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Done { elapsed, .. } => {
                self.bar.set_style(style(DONE_TEMPLATE));
                self.bar.finish_with_message(format!("Done in {elapsed:.2?}!"));
            }
            JobOutcome::AlreadyArchived => {
                self.bar.set_style(style(DONE_TEMPLATE));
                self.bar
                    .finish_with_message(format!("{id} is already archived, nothing to do."));
            }
            JobOutcome::RolledBack { stage, error } => {
                self.bar.set_style(style(FAILED_TEMPLATE));
                self.bar.abandon_with_message(format!(
                    "Error during {stage}: {error} (partial output removed)"
                ));
            }
            JobOutcome::Fatal { stage, error } => {
                self.bar.set_style(style(FAILED_TEMPLATE));
                self.bar
                    .abandon_with_message(format!("Error during {stage}: {error}"));
            }
        }
    }
}
