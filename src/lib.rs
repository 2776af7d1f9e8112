//! YouTube metadata archiver library.
//!
//! Archives the description, annotations and thumbnail of a set of videos to
//! a sharded directory tree, running one job per video on a bounded worker
//! pool. Partial output of a failed job is rolled back, and already archived
//! videos are skipped.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod archiver;
pub mod config;
pub mod constants;
pub mod fetcher;
pub mod identifier;
pub mod log_sink;
pub mod progress;
pub mod store;
