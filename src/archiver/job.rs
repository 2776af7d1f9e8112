//! The per-identifier archive pipeline.
//!
//! A job walks its identifier through a fixed sequence of stages. Every stage
//! only starts after the previous one succeeded. Failures before any output
//! exists are fatal; failures after the output directory was allocated roll
//! the directory back so a later run starts from a clean slate.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::id_lock::IdentifierLocks;
use super::{artifact_file_name, normalize_title, ArchiveRecord, ArtifactKind};
use crate::fetcher::{ContentFetcher, FetchError};
use crate::identifier::VideoId;
use crate::log_sink::{JobLog, LogSink};
use crate::store::{ArchiveStore, StoreError};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    PresenceCheck,
    PathAllocation,
    ContentFetch,
    SubtitleFetch,
    Persist,
    ThumbnailDownload,
    Done,
}

impl Stage {
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::PresenceCheck => "presence_check",
            Self::PathAllocation => "path_allocation",
            Self::ContentFetch => "content_fetch",
            Self::SubtitleFetch => "subtitle_fetch",
            Self::Persist => "persist",
            Self::ThumbnailDownload => "thumbnail_download",
            Self::Done => "done",
        }
    }

    /// Human-readable progress line for this stage.
    #[must_use]
    pub fn announcement(self, id: &VideoId) -> String {
        match self {
            Self::Init => format!("Archiving ID: {id}"),
            Self::PresenceCheck => "Checking for an existing archive..".to_string(),
            Self::PathAllocation => "Creating output directory..".to_string(),
            Self::ContentFetch => "Parsing description, title and thumbnail..".to_string(),
            Self::SubtitleFetch => "Fetching annotations..".to_string(),
            Self::Persist => "Writing informations locally..".to_string(),
            Self::ThumbnailDownload => "Downloading thumbnail..".to_string(),
            Self::Done => "Done".to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("job aborted: {0}")]
    Aborted(String),
}

/// Terminal state of a job.
#[derive(Debug)]
pub enum JobOutcome {
    /// Every stage succeeded.
    Done {
        elapsed: Duration,
        files: Vec<PathBuf>,
    },
    /// Output was already present; nothing was fetched or written.
    AlreadyArchived,
    /// A stage after path allocation failed and the output directory was removed.
    RolledBack { stage: Stage, error: JobError },
    /// A stage failed before any output existed.
    Fatal { stage: Stage, error: JobError },
}

impl JobOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::AlreadyArchived)
    }

    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Done { .. } => "done",
            Self::AlreadyArchived => "already_archived",
            Self::RolledBack { .. } => "rolled_back",
            Self::Fatal { .. } => "fatal",
        }
    }
}

/// Receives stage transitions, e.g. to drive console output.
pub trait StageObserver: Send + Sync {
    fn stage_started(&self, _id: &VideoId, _stage: Stage) {}

    fn finished(&self, _id: &VideoId, _outcome: &JobOutcome) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// Collaborators shared by every job of a run.
#[derive(Clone)]
pub struct JobContext {
    store: Arc<dyn ArchiveStore>,
    fetcher: Arc<dyn ContentFetcher>,
    sink: LogSink,
    locks: Arc<IdentifierLocks>,
    observer: Arc<dyn StageObserver>,
}

impl JobContext {
    pub fn new(store: Arc<dyn ArchiveStore>, fetcher: Arc<dyn ContentFetcher>, sink: LogSink) -> Self {
        Self {
            store,
            fetcher,
            sink,
            locks: Arc::new(IdentifierLocks::new()),
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }
}

type StageResult<T> = Result<T, (Stage, JobError)>;

fn at<E: Into<JobError>>(stage: Stage) -> impl FnOnce(E) -> (Stage, JobError) {
    move |e| (stage, e.into())
}

/// One identifier's trip through the pipeline.
pub struct Job {
    record: ArchiveRecord,
    ctx: JobContext,
}

impl Job {
    #[must_use]
    pub fn new(id: VideoId, ctx: JobContext) -> Self {
        Self {
            record: ArchiveRecord::new(id),
            ctx,
        }
    }

    /// Run every stage to a terminal state. Never panics on I/O failures and
    /// never touches other identifiers' output.
    pub async fn run(mut self) -> JobOutcome {
        let start = Instant::now();
        let id = self.record.id.clone();

        let log = self.ctx.sink.job(&id);
        self.enter(&log, Stage::Init).await;
        let _claim = self.ctx.locks.acquire(&id).await;
        self.complete(Stage::Init);

        let outcome = self.drive(&log, start).await;
        debug!(
            video_id = %id,
            status = outcome.status(),
            stage_reached = ?self.record.stage_reached,
            "Job finished"
        );
        self.ctx.observer.finished(&id, &outcome);
        outcome
    }

    async fn drive(&mut self, log: &JobLog, start: Instant) -> JobOutcome {
        self.enter(log, Stage::PresenceCheck).await;
        let exists = self.ctx.store.exists(&self.record.id).await;
        match exists {
            Ok(true) => return self.already_archived(log).await,
            Ok(false) => self.complete(Stage::PresenceCheck),
            Err(e) => return fatal(log, &self.record.id, Stage::PresenceCheck, e.into()).await,
        }

        self.enter(log, Stage::PathAllocation).await;
        let allocated = self.ctx.store.allocate_path(&self.record.id).await;
        let dir = match allocated {
            Ok(dir) => dir,
            Err(e) => return fatal(log, &self.record.id, Stage::PathAllocation, e.into()).await,
        };
        self.record.output_path = Some(dir.clone());
        self.complete(Stage::PathAllocation);

        let archived = self.archive_content(log, &dir).await;
        match archived {
            Ok(files) => self.done(log, start, files).await,
            Err((stage, error)) => self.rollback(log, &dir, stage, error).await,
        }
    }

    async fn archive_content(&mut self, log: &JobLog, dir: &Path) -> StageResult<Vec<PathBuf>> {
        let id = self.record.id.clone();

        self.enter(log, Stage::ContentFetch).await;
        let page = self
            .ctx
            .fetcher
            .fetch_page(&id)
            .await
            .map_err(at(Stage::ContentFetch))?;
        // Normalized once here; every artifact name below reuses this value.
        let title = normalize_title(&page.title);
        self.record.title = Some(title.clone());
        self.record.description = Some(page.description);
        self.record.thumbnail_ref = Some(page.thumbnail_ref);
        self.complete(Stage::ContentFetch);

        self.enter(log, Stage::SubtitleFetch).await;
        let annotations = self
            .ctx
            .fetcher
            .fetch_subtitles_or_annotations(&id)
            .await
            .map_err(at(Stage::SubtitleFetch))?;
        self.record.annotations = Some(annotations);
        self.complete(Stage::SubtitleFetch);

        self.enter(log, Stage::Persist).await;
        let mut files = Vec::with_capacity(ArtifactKind::ALL.len());
        for (kind, contents) in [
            (ArtifactKind::Description, self.record.description.as_deref()),
            (ArtifactKind::Annotations, self.record.annotations.as_deref()),
        ] {
            let path = self
                .ctx
                .store
                .write_artifact(
                    dir,
                    &artifact_file_name(&id, &title, kind),
                    contents.unwrap_or_default().as_bytes(),
                )
                .await
                .map_err(at(Stage::Persist))?;
            files.push(path);
        }
        self.complete(Stage::Persist);

        self.enter(log, Stage::ThumbnailDownload).await;
        let thumbnail_ref = self.record.thumbnail_ref.clone().unwrap_or_default();
        let bytes = self
            .ctx
            .fetcher
            .fetch_thumbnail_bytes(&thumbnail_ref)
            .await
            .map_err(at(Stage::ThumbnailDownload))?;
        let path = self
            .ctx
            .store
            .write_artifact(
                dir,
                &artifact_file_name(&id, &title, ArtifactKind::Thumbnail),
                &bytes,
            )
            .await
            .map_err(at(Stage::ThumbnailDownload))?;
        files.push(path);
        self.complete(Stage::ThumbnailDownload);

        Ok(files)
    }

    async fn already_archived(&mut self, log: &JobLog) -> JobOutcome {
        if let Err(e) = self.ctx.store.mark_archived(&self.record.id).await {
            return fatal(log, &self.record.id, Stage::PresenceCheck, e.into()).await;
        }
        self.complete(Stage::PresenceCheck);
        info!(video_id = %self.record.id, "Already archived, skipping");
        log.line("already archived, skipping").await;
        JobOutcome::AlreadyArchived
    }

    async fn done(&mut self, log: &JobLog, start: Instant, files: Vec<PathBuf>) -> JobOutcome {
        self.enter(log, Stage::Done).await;
        // Output is complete on disk; a directory scan still detects it.
        if let Err(e) = self.ctx.store.mark_archived(&self.record.id).await {
            warn!(video_id = %self.record.id, error = %e, "Failed to record identifier as archived");
            log.line(format!("failed to record as archived: {e}")).await;
        }
        self.complete(Stage::Done);

        let elapsed = start.elapsed();
        info!(
            video_id = %self.record.id,
            elapsed = ?elapsed,
            files = files.len(),
            "Archive complete"
        );
        log.line(format!("archiving completed in {elapsed:.2?}")).await;
        JobOutcome::Done { elapsed, files }
    }

    async fn rollback(&self, log: &JobLog, dir: &Path, stage: Stage, error: JobError) -> JobOutcome {
        error!(
            video_id = %self.record.id,
            stage = %stage,
            error = %error,
            "Stage failed, discarding partial output"
        );
        log.line(format!("{stage} failed: {error}")).await;

        if let Err(e) = self.ctx.store.discard(dir).await {
            error!(
                video_id = %self.record.id,
                path = %dir.display(),
                error = %e,
                "Failed to discard partial output"
            );
            log.line(format!("failed to discard {}: {e}", dir.display())).await;
        }
        JobOutcome::RolledBack { stage, error }
    }

    async fn enter(&self, log: &JobLog, stage: Stage) {
        debug!(video_id = %self.record.id, stage = %stage, "Entering stage");
        log.line(stage.announcement(&self.record.id)).await;
        self.ctx.observer.stage_started(&self.record.id, stage);
    }

    fn complete(&mut self, stage: Stage) {
        self.record.stage_reached = Some(stage);
    }
}

async fn fatal(log: &JobLog, id: &VideoId, stage: Stage, error: JobError) -> JobOutcome {
    error!(video_id = %id, stage = %stage, error = %error, "Fatal error");
    log.line(format!("{stage} failed: {error}")).await;
    JobOutcome::Fatal { stage, error }
}
