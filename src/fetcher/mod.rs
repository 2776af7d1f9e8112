use async_trait::async_trait;
use thiserror::Error;

use crate::identifier::VideoId;

pub mod page;
mod youtube;

pub use page::{extract_page_metadata, PageMetadata};
pub use youtube::YouTubeFetcher;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("page for {0} has no usable title")]
    MissingTitle(String),
}

/// Metadata scraped from a video page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    /// Raw title as published; normalized later by the job.
    pub title: String,
    pub description: String,
    /// Where the thumbnail can be downloaded from.
    pub thumbnail_ref: String,
}

/// Remote content the archive job pulls for each identifier.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the watch page and extract title, description and thumbnail reference.
    async fn fetch_page(&self, id: &VideoId) -> Result<PageContent, FetchError>;

    /// Fetch annotations (or subtitles). Empty text means none are published.
    async fn fetch_subtitles_or_annotations(&self, id: &VideoId) -> Result<String, FetchError>;

    /// Download the thumbnail image.
    async fn fetch_thumbnail_bytes(&self, thumbnail_ref: &str) -> Result<Vec<u8>, FetchError>;
}
