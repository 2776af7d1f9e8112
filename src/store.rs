//! Filesystem-backed archive state.
//!
//! Output lives under `{output_dir}/{shard}/{id}/`, where the shard is the
//! first character of the identifier. Identifiers known to be archived are
//! also recorded, one per line, in the archived-ids file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::archiver::ArtifactKind;
use crate::identifier::VideoId;

#[derive(Debug, Error)]
#[error("failed to {op} {}: {source}", path.display())]
pub struct StoreError {
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl StoreError {
    fn new(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Storage operations the archive job relies on.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Whether output for `id` is already fully present.
    async fn exists(&self, id: &VideoId) -> Result<bool, StoreError>;

    /// Record `id` as archived. Calling this twice is harmless.
    async fn mark_archived(&self, id: &VideoId) -> Result<(), StoreError>;

    /// Create the output directory for `id` and return it.
    async fn allocate_path(&self, id: &VideoId) -> Result<PathBuf, StoreError>;

    /// Write one artifact into a directory returned by [`Self::allocate_path`].
    async fn write_artifact(
        &self,
        dir: &Path,
        file_name: &str,
        contents: &[u8],
    ) -> Result<PathBuf, StoreError>;

    /// Recursively remove `path`. A missing path is not an error.
    async fn discard(&self, path: &Path) -> Result<(), StoreError>;
}

/// [`ArchiveStore`] over a local directory tree.
#[derive(Debug)]
pub struct FsArchiveStore {
    root: PathBuf,
    archived_ids_path: PathBuf,
    archived: Mutex<HashSet<String>>,
}

impl FsArchiveStore {
    /// Open the store, loading previously archived identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the archived-ids file exists but cannot be read.
    pub async fn open(root: &Path, archived_ids_path: &Path) -> Result<Self, StoreError> {
        let archived = match tokio::fs::read_to_string(archived_ids_path).await {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(StoreError::new("read", archived_ids_path, e)),
        };
        debug!(
            path = %archived_ids_path.display(),
            count = archived.len(),
            "Loaded archived identifiers"
        );

        Ok(Self {
            root: root.to_path_buf(),
            archived_ids_path: archived_ids_path.to_path_buf(),
            archived: Mutex::new(archived),
        })
    }

    /// Directory that holds (or would hold) the output for `id`.
    #[must_use]
    pub fn path_for(&self, id: &VideoId) -> PathBuf {
        self.root
            .join(id.shard().to_string())
            .join(id.as_str())
    }

    async fn has_all_artifacts(&self, id: &VideoId) -> Result<bool, StoreError> {
        let dir = self.path_for(id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::new("read directory", &dir, e)),
        };

        let prefix = format!("{id}_");
        let mut missing: Vec<ArtifactKind> = ArtifactKind::ALL.to_vec();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::new("read directory", &dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) {
                continue;
            }
            missing.retain(|kind| !name.ends_with(&format!(".{}", kind.extension())));
        }
        Ok(missing.is_empty())
    }
}

#[async_trait]
impl ArchiveStore for FsArchiveStore {
    async fn exists(&self, id: &VideoId) -> Result<bool, StoreError> {
        if self.archived.lock().await.contains(id.as_str()) {
            return Ok(true);
        }
        self.has_all_artifacts(id).await
    }

    async fn mark_archived(&self, id: &VideoId) -> Result<(), StoreError> {
        let mut archived = self.archived.lock().await;
        if archived.contains(id.as_str()) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.archived_ids_path)
            .await
            .map_err(|e| StoreError::new("open", &self.archived_ids_path, e))?;
        file.write_all(format!("{id}\n").as_bytes())
            .await
            .map_err(|e| StoreError::new("append to", &self.archived_ids_path, e))?;
        file.flush()
            .await
            .map_err(|e| StoreError::new("flush", &self.archived_ids_path, e))?;

        archived.insert(id.to_string());
        Ok(())
    }

    async fn allocate_path(&self, id: &VideoId) -> Result<PathBuf, StoreError> {
        let dir = self.path_for(id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::new("create directory", &dir, e))?;
        Ok(dir)
    }

    async fn write_artifact(
        &self,
        dir: &Path,
        file_name: &str,
        contents: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = dir.join(file_name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| StoreError::new("write", &path, e))?;
        Ok(path)
    }

    async fn discard(&self, path: &Path) -> Result<(), StoreError> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::new("remove", path, e)),
        }
    }
}
