//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use youtube_ma::archiver::JobContext;
use youtube_ma::fetcher::{ContentFetcher, FetchError, PageContent};
use youtube_ma::identifier::VideoId;
use youtube_ma::log_sink::LogSink;
use youtube_ma::store::{ArchiveStore, FsArchiveStore, StoreError};

pub fn id(raw: &str) -> VideoId {
    VideoId::parse(raw).expect("valid identifier")
}

fn mock_failure(what: &str) -> FetchError {
    FetchError::Status {
        url: format!("mock://{what}"),
        status: 500,
    }
}

/// Scripted [`ContentFetcher`] that counts calls and tracks concurrency.
#[derive(Default)]
pub struct MockFetcher {
    titles: Mutex<HashMap<String, String>>,
    fail_page: Mutex<HashSet<String>>,
    fail_subtitles: Mutex<HashSet<String>>,
    fail_thumbnail: Mutex<HashSet<String>>,
    delay: Duration,
    pub page_calls: AtomicUsize,
    pub subtitle_calls: AtomicUsize,
    pub thumbnail_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn set_title(&self, id: &str, title: &str) {
        self.titles
            .lock()
            .unwrap()
            .insert(id.to_string(), title.to_string());
    }

    pub fn fail_page(&self, id: &str) {
        self.fail_page.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_subtitles(&self, id: &str) {
        self.fail_subtitles.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_thumbnail(&self, id: &str) {
        self.fail_thumbnail.lock().unwrap().insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_page.lock().unwrap().clear();
        self.fail_subtitles.lock().unwrap().clear();
        self.fail_thumbnail.lock().unwrap().clear();
    }

    pub fn total_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
            + self.subtitle_calls.load(Ordering::SeqCst)
            + self.thumbnail_calls.load(Ordering::SeqCst)
    }

    async fn io(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch_page(&self, id: &VideoId) -> Result<PageContent, FetchError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.io().await;
        if self.fail_page.lock().unwrap().contains(id.as_str()) {
            return Err(mock_failure("page"));
        }
        let title = self
            .titles
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .unwrap_or_else(|| "Test Clip".to_string());
        Ok(PageContent {
            title,
            description: "hello".to_string(),
            thumbnail_ref: format!("http://thumbs.test/{id}.jpg"),
        })
    }

    async fn fetch_subtitles_or_annotations(&self, id: &VideoId) -> Result<String, FetchError> {
        self.subtitle_calls.fetch_add(1, Ordering::SeqCst);
        self.io().await;
        if self.fail_subtitles.lock().unwrap().contains(id.as_str()) {
            return Err(mock_failure("subtitles"));
        }
        Ok(String::new())
    }

    async fn fetch_thumbnail_bytes(&self, thumbnail_ref: &str) -> Result<Vec<u8>, FetchError> {
        self.thumbnail_calls.fetch_add(1, Ordering::SeqCst);
        self.io().await;
        let failing = self
            .fail_thumbnail
            .lock()
            .unwrap()
            .iter()
            .any(|id| thumbnail_ref.ends_with(&format!("/{id}.jpg")));
        if failing {
            return Err(mock_failure("thumbnail"));
        }
        Ok(vec![0xAB; 10])
    }
}

/// [`FsArchiveStore`] wrapper that counts calls and injects failures.
pub struct RecordingStore {
    inner: FsArchiveStore,
    pub exists_calls: AtomicUsize,
    pub mark_calls: AtomicUsize,
    pub allocate_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
    pub discard_calls: AtomicUsize,
    fail_exists: Mutex<HashSet<String>>,
    fail_allocate: Mutex<HashSet<String>>,
    fail_write_suffix: Mutex<Option<String>>,
}

impl RecordingStore {
    pub async fn open(root: &Path) -> Self {
        let inner = FsArchiveStore::open(root, &root.join("archived_ids.txt"))
            .await
            .expect("open store");
        Self {
            inner,
            exists_calls: AtomicUsize::new(0),
            mark_calls: AtomicUsize::new(0),
            allocate_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            discard_calls: AtomicUsize::new(0),
            fail_exists: Mutex::new(HashSet::new()),
            fail_allocate: Mutex::new(HashSet::new()),
            fail_write_suffix: Mutex::new(None),
        }
    }

    pub fn path_for(&self, id: &VideoId) -> PathBuf {
        self.inner.path_for(id)
    }

    pub fn fail_exists(&self, id: &str) {
        self.fail_exists.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_allocate(&self, id: &str) {
        self.fail_allocate.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_writes_ending_with(&self, suffix: &str) {
        *self.fail_write_suffix.lock().unwrap() = Some(suffix.to_string());
    }

    pub fn write_like_calls(&self) -> usize {
        self.mark_calls.load(Ordering::SeqCst)
            + self.allocate_calls.load(Ordering::SeqCst)
            + self.write_calls.load(Ordering::SeqCst)
            + self.discard_calls.load(Ordering::SeqCst)
    }
}

fn injected(op: &'static str, path: &Path) -> StoreError {
    StoreError {
        op,
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected failure"),
    }
}

#[async_trait]
impl ArchiveStore for RecordingStore {
    async fn exists(&self, id: &VideoId) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exists.lock().unwrap().contains(id.as_str()) {
            return Err(injected("read directory", &self.inner.path_for(id)));
        }
        self.inner.exists(id).await
    }

    async fn mark_archived(&self, id: &VideoId) -> Result<(), StoreError> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_archived(id).await
    }

    async fn allocate_path(&self, id: &VideoId) -> Result<PathBuf, StoreError> {
        self.allocate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_allocate.lock().unwrap().contains(id.as_str()) {
            return Err(injected("create directory", &self.inner.path_for(id)));
        }
        self.inner.allocate_path(id).await
    }

    async fn write_artifact(
        &self,
        dir: &Path,
        file_name: &str,
        contents: &[u8],
    ) -> Result<PathBuf, StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_write_suffix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|suffix| file_name.ends_with(suffix));
        if failing {
            return Err(injected("write", &dir.join(file_name)));
        }
        self.inner.write_artifact(dir, file_name, contents).await
    }

    async fn discard(&self, path: &Path) -> Result<(), StoreError> {
        self.discard_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.discard(path).await
    }
}

/// Temp output tree plus mock collaborators wired into a [`JobContext`].
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<RecordingStore>,
    pub fetcher: Arc<MockFetcher>,
    pub ctx: JobContext,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_fetcher(MockFetcher::new()).await
    }

    pub async fn with_fetcher(fetcher: MockFetcher) -> Self {
        Self::build(fetcher, &[]).await
    }

    /// Harness whose archived-ids file already lists `archived`.
    pub async fn with_archived(archived: &[&str]) -> Self {
        Self::build(MockFetcher::new(), archived).await
    }

    async fn build(fetcher: MockFetcher, archived: &[&str]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        if !archived.is_empty() {
            let contents: String = archived.iter().map(|id| format!("{id}\n")).collect();
            std::fs::write(dir.path().join("archived_ids.txt"), contents)
                .expect("seed archived ids");
        }
        let store = Arc::new(RecordingStore::open(dir.path()).await);
        let fetcher = Arc::new(fetcher);
        let sink = LogSink::open(&dir.path().join("youtube-ma.log"))
            .await
            .expect("open log");
        let ctx = JobContext::new(store.clone(), fetcher.clone(), sink);
        Self {
            dir,
            store,
            fetcher,
            ctx,
        }
    }

    pub fn log_contents(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("youtube-ma.log")).unwrap_or_default()
    }

    /// Names of the files under the identifier's output directory.
    pub fn files_for(&self, id: &VideoId) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.store.path_for(id)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
