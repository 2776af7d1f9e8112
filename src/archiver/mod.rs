use std::path::PathBuf;

use crate::identifier::VideoId;

pub mod id_lock;
pub mod job;
pub mod pool;

pub use id_lock::IdentifierLocks;
pub use job::{Job, JobContext, JobError, JobOutcome, NoopObserver, Stage, StageObserver};
pub use pool::{BatchReport, OutcomeRecord, PoolError, WorkerPool};

const MAX_TITLE_LENGTH: usize = 200;

/// Make a video title safe for use inside file names.
///
/// This function:
/// - Replaces whitespace with underscores
/// - Replaces path separators and URL/shell-unsafe characters with underscores
/// - Collapses runs of underscores and trims them from the edges
/// - Limits length to avoid filesystem issues
///
/// An empty result becomes `untitled` so artifact names never end in a bare `_`.
///
/// # Examples
///
/// ```
/// # use youtube_ma::archiver::normalize_title;
/// assert_eq!(normalize_title("My Video"), "My_Video");
/// assert_eq!(normalize_title("Test & Demo?"), "Test_Demo");
/// ```
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| match c {
            '(' | ')' | '[' | ']' | '-' | '_' | '.' => c,
            c if c.is_alphanumeric() => c,
            _ => '_',
        })
        .collect();

    let collapsed = mapped
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let mut end = collapsed.len().min(MAX_TITLE_LENGTH);
    while !collapsed.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = collapsed[..end].trim_end_matches('_');

    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated.to_string()
    }
}

/// The files written for every archived identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Description,
    Annotations,
    Thumbnail,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Description,
        ArtifactKind::Annotations,
        ArtifactKind::Thumbnail,
    ];

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Annotations => "annotations.xml",
            Self::Thumbnail => "jpg",
        }
    }
}

/// `{id}_{title}.{extension}`; `title` must already be normalized.
#[must_use]
pub fn artifact_file_name(id: &VideoId, title: &str, kind: ArtifactKind) -> String {
    format!("{id}_{title}.{}", kind.extension())
}

/// Working state of one job. Owned by the job and dropped when it returns.
#[derive(Debug, Clone)]
pub struct ArchiveRecord {
    pub id: VideoId,
    pub output_path: Option<PathBuf>,
    /// Normalized title, set once by the content fetch stage.
    pub title: Option<String>,
    pub description: Option<String>,
    pub annotations: Option<String>,
    pub thumbnail_ref: Option<String>,
    /// Highest stage completed, for diagnostics only.
    pub stage_reached: Option<Stage>,
}

impl ArchiveRecord {
    #[must_use]
    pub fn new(id: VideoId) -> Self {
        Self {
            id,
            output_path: None,
            title: None,
            description: None,
            annotations: None,
            thumbnail_ref: None,
            stage_reached: None,
        }
    }
}
