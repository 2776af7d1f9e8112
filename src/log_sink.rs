//! Shared append-only job log.
//!
//! Every job appends to the same file. Each line is prefixed with the job's
//! identifier and a timestamp, and is written with a single `write_all` while
//! holding the file lock, so lines from concurrent jobs never interleave.

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::constants::LOG_TIMESTAMP_FORMAT;
use crate::identifier::VideoId;

/// Process-wide log destination shared by all jobs.
#[derive(Debug, Clone)]
pub struct LogSink {
    file: Arc<Mutex<File>>,
}

impl LogSink {
    /// Open (or create) the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Log handle scoped to one identifier.
    #[must_use]
    pub fn job(&self, id: &VideoId) -> JobLog {
        JobLog {
            sink: self.clone(),
            prefix: id.to_string(),
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// Per-job view of the [`LogSink`].
#[derive(Debug, Clone)]
pub struct JobLog {
    sink: LogSink,
    prefix: String,
}

impl JobLog {
    /// Append one line. Write failures are reported through `tracing` only.
    pub async fn line(&self, message: impl Display) {
        let line = format_line(&self.prefix, &Local::now().format(LOG_TIMESTAMP_FORMAT), &message);
        if let Err(e) = self.sink.append(&line).await {
            warn!(video_id = %self.prefix, error = %e, "Failed to write job log line");
        }
    }
}

fn format_line(prefix: &str, timestamp: &impl Display, message: &impl Display) -> String {
    let message = message.to_string().replace('\n', " ");
    format!("{prefix} {timestamp} {message}\n")
}
