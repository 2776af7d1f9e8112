//! Shared constants used across the application.

/// User agent string used for archival HTTP requests.
///
/// A realistic browser user agent: the watch page serves a stripped-down
/// document to unknown clients, which lacks the description markup.
pub const ARCHIVAL_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Base URL for watch pages.
pub const DEFAULT_PAGE_BASE_URL: &str = "https://www.youtube.com";

/// Base URL for the legacy annotations endpoint.
pub const DEFAULT_ANNOTATIONS_BASE_URL: &str = "https://www.youtube.com";

/// Base URL for thumbnails when the page does not advertise one.
pub const DEFAULT_THUMBNAIL_BASE_URL: &str = "http://i3.ytimg.com";

/// Timestamp layout for job log lines (`2006/01/02 15:04:05` style).
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
