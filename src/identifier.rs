//! Video identifiers.
//!
//! Identifiers are opaque tokens handed to us by the caller. They end up
//! verbatim in directory names and remote URLs, so anything that could escape
//! the output tree is rejected up front.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier {0:?} contains a path separator")]
    PathSeparator(String),
    #[error("identifier {0:?} contains whitespace or control characters")]
    InvalidCharacter(String),
    #[error("identifier {0:?} is a relative path component")]
    RelativeComponent(String),
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<IdentifierError>,
    },
}

/// A validated content identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Parse and validate an identifier. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or could not be used
    /// safely as a directory name.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if id.contains('/') || id.contains('\\') {
            return Err(IdentifierError::PathSeparator(id.to_string()));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(IdentifierError::InvalidCharacter(id.to_string()));
        }
        if id == "." || id == ".." {
            return Err(IdentifierError::RelativeComponent(id.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First character of the identifier, used to shard output directories.
    #[must_use]
    pub fn shard(&self) -> char {
        // Non-empty by construction.
        self.0.chars().next().unwrap_or('_')
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse a newline-separated list of identifiers.
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
///
/// Returns the first invalid identifier, tagged with its 1-based line number.
pub fn parse_id_list(contents: &str) -> Result<Vec<VideoId>, IdentifierError> {
    contents
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, raw)| {
            VideoId::parse(raw).map_err(|e| IdentifierError::Line {
                line,
                source: Box::new(e),
            })
        })
        .collect()
}
