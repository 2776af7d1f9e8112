use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tracing::{debug, error, info};

use super::job::{Job, JobContext, JobError, JobOutcome, Stage};
use crate::identifier::VideoId;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool limit must be at least 1")]
    ZeroLimit,
    #[error("worker pool semaphore closed: {0}")]
    Closed(#[from] AcquireError),
}

/// Bounded-concurrency driver running one [`Job`] per identifier.
pub struct WorkerPool {
    ctx: JobContext,
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl WorkerPool {
    /// Create a pool that runs at most `limit` jobs at once.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroLimit`] if `limit` is zero.
    pub fn new(ctx: JobContext, limit: usize) -> Result<Self, PoolError> {
        if limit == 0 {
            return Err(PoolError::ZeroLimit);
        }
        Ok(Self {
            ctx,
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Archive every identifier in `ids` and wait for all of them.
    ///
    /// Each identifier gets exactly one job. Jobs are independent: a failure is
    /// recorded in the report and the remaining identifiers still run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the pool's semaphore was closed.
    pub async fn run(&self, ids: Vec<VideoId>) -> Result<BatchReport, PoolError> {
        info!(count = ids.len(), limit = self.limit, "Starting batch");
        let mut handles = Vec::with_capacity(ids.len());

        for id in ids {
            let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
            let job = Job::new(id.clone(), self.ctx.clone());

            let handle = tokio::spawn(async move {
                let _permit = permit;
                job.run().await
            });
            debug!(video_id = %id, "Job scheduled");
            handles.push((id, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(video_id = %id, "Worker task panicked: {e}");
                    JobOutcome::Fatal {
                        stage: Stage::Init,
                        error: JobError::Aborted(e.to_string()),
                    }
                }
            };
            outcomes.push((id, outcome));
        }

        let report = BatchReport { outcomes };
        info!(
            done = report.done(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Batch complete"
        );
        Ok(report)
    }
}

/// Per-identifier outcomes of one batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(VideoId, JobOutcome)>,
}

impl BatchReport {
    #[must_use]
    pub fn done(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Done { .. }))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::AlreadyArchived))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| !o.is_success())
    }

    #[must_use]
    pub fn outcome(&self, id: &VideoId) -> Option<&JobOutcome> {
        self.outcomes
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, outcome)| outcome)
    }

    /// Serializable view of the report.
    #[must_use]
    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.outcomes
            .iter()
            .map(|(id, outcome)| OutcomeRecord::new(id, outcome))
            .collect()
    }

    fn count(&self, pred: impl Fn(&JobOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// One row of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub id: VideoId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl OutcomeRecord {
    fn new(id: &VideoId, outcome: &JobOutcome) -> Self {
        let (stage, error, elapsed_ms) = match outcome {
            JobOutcome::Done { elapsed, .. } => (
                None,
                None,
                Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
            ),
            JobOutcome::AlreadyArchived => (None, None, None),
            JobOutcome::RolledBack { stage, error } | JobOutcome::Fatal { stage, error } => {
                (Some(*stage), Some(error.to_string()), None)
            }
        };
        Self {
            id: id.clone(),
            status: outcome.status(),
            stage,
            error,
            elapsed_ms,
        }
    }
}
