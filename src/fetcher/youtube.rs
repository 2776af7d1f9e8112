use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::page::extract_page_metadata;
use super::{ContentFetcher, FetchError, PageContent};
use crate::config::Config;
use crate::constants::ARCHIVAL_USER_AGENT;
use crate::identifier::VideoId;

/// [`ContentFetcher`] talking to YouTube (or any server with the same URL layout).
#[derive(Debug, Clone)]
pub struct YouTubeFetcher {
    client: Client,
    page_base_url: String,
    annotations_base_url: String,
    thumbnail_base_url: String,
}

impl YouTubeFetcher {
    /// Build a fetcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(ARCHIVAL_USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            page_base_url: trim_base(&config.page_base_url),
            annotations_base_url: trim_base(&config.annotations_base_url),
            thumbnail_base_url: trim_base(&config.thumbnail_base_url),
        })
    }

    fn watch_url(&self, id: &VideoId) -> String {
        format!(
            "{}/watch?v={}",
            self.page_base_url,
            urlencoding::encode(id.as_str())
        )
    }

    fn annotations_url(&self, id: &VideoId) -> String {
        format!(
            "{}/annotations_invideo?features=1&legacy=1&video_id={}",
            self.annotations_base_url,
            urlencoding::encode(id.as_str())
        )
    }

    /// Thumbnail location used when the page does not advertise one.
    #[must_use]
    pub fn default_thumbnail_url(&self, id: &VideoId) -> String {
        format!(
            "{}/vi/{}/maxresdefault.jpg",
            self.thumbnail_base_url,
            urlencoding::encode(id.as_str())
        )
    }

    async fn get_ok(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait]
impl ContentFetcher for YouTubeFetcher {
    async fn fetch_page(&self, id: &VideoId) -> Result<PageContent, FetchError> {
        let url = self.watch_url(id);
        debug!(video_id = %id, url = %url, "Fetching watch page");

        let html = self.get_ok(&url).await?.text().await?;
        let metadata = extract_page_metadata(&html);

        let title = metadata
            .title
            .ok_or_else(|| FetchError::MissingTitle(id.to_string()))?;
        let thumbnail_ref = metadata
            .thumbnail
            .unwrap_or_else(|| self.default_thumbnail_url(id));

        Ok(PageContent {
            title,
            description: metadata.description.unwrap_or_default(),
            thumbnail_ref,
        })
    }

    async fn fetch_subtitles_or_annotations(&self, id: &VideoId) -> Result<String, FetchError> {
        let url = self.annotations_url(id);
        debug!(video_id = %id, url = %url, "Fetching annotations");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(video_id = %id, status = status.as_u16(), "Unable to fetch annotations, archiving without them");
            return Ok(String::new());
        }
        Ok(response.text().await?)
    }

    async fn fetch_thumbnail_bytes(&self, thumbnail_ref: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url = %thumbnail_ref, "Downloading thumbnail");
        let bytes = self.get_ok(thumbnail_ref).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
