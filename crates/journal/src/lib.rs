//! Append-only event journal
//!
//! This crate provides:
//! - A line-oriented, append-only log file shared across threads
//! - The timestamped line format used for change events
//! - A [`watcher::LogSink`] implementation for wiring into a watch

pub mod journal;

// Re-exports
pub use journal::{format_line, EventJournal, STARTED_BANNER, STOPPED_BANNER, TIMESTAMP_FORMAT};

/// Result type for journal operations
pub type Result<T> = anyhow::Result<T>;
