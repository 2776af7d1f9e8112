use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::constants::{
    DEFAULT_ANNOTATIONS_BASE_URL, DEFAULT_PAGE_BASE_URL, DEFAULT_THUMBNAIL_BASE_URL,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Output
    pub output_dir: PathBuf,
    /// Resolved against `output_dir` unless absolute.
    pub archived_ids_file: PathBuf,
    /// Resolved against `output_dir` unless absolute.
    pub log_file: PathBuf,

    // Workers
    pub worker_concurrency: usize,

    // Remote service
    pub page_base_url: String,
    pub annotations_base_url: String,
    pub thumbnail_base_url: String,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Output
            output_dir: PathBuf::from(env_or_default("OUTPUT_DIR", ".")),
            archived_ids_file: PathBuf::from(env_or_default(
                "ARCHIVED_IDS_FILE",
                "archived_ids.txt",
            )),
            log_file: PathBuf::from(env_or_default("LOG_FILE", "youtube-ma.log")),

            // Workers
            worker_concurrency: parse_env_usize("WORKER_CONCURRENCY", 4)?,

            // Remote service
            page_base_url: env_or_default("PAGE_BASE_URL", DEFAULT_PAGE_BASE_URL),
            annotations_base_url: env_or_default(
                "ANNOTATIONS_BASE_URL",
                DEFAULT_ANNOTATIONS_BASE_URL,
            ),
            thumbnail_base_url: env_or_default("THUMBNAIL_BASE_URL", DEFAULT_THUMBNAIL_BASE_URL),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),
        })
    }

    /// Defaults suitable for tests; override fields with struct update syntax.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            output_dir: PathBuf::from("./test-output"),
            archived_ids_file: PathBuf::from("archived_ids.txt"),
            log_file: PathBuf::from("youtube-ma.log"),
            worker_concurrency: 2,
            page_base_url: "http://127.0.0.1:1".to_string(),
            annotations_base_url: "http://127.0.0.1:1".to_string(),
            thumbnail_base_url: "http://127.0.0.1:1".to_string(),
            http_timeout: Duration::from_secs(5),
        }
    }

    /// Location of the archived-ids file.
    #[must_use]
    pub fn archived_ids_path(&self) -> PathBuf {
        self.output_dir.join(&self.archived_ids_file)
    }

    /// Location of the shared job log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(&self.log_file)
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WORKER_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("PAGE_BASE_URL", &self.page_base_url),
            ("ANNOTATIONS_BASE_URL", &self.annotations_base_url),
            ("THUMBNAIL_BASE_URL", &self.thumbnail_base_url),
        ] {
            if let Err(e) = Url::parse(value) {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("'{value}' is not a valid URL: {e}"),
                });
            }
        }
        Ok(())
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
