//! Append-only text journal

use crate::Result;
use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;
use watcher::LogSink;

/// `strftime` layout of the line prefix
pub const TIMESTAMP_FORMAT: &str = "%d:%m:%Y %H:%M:%S";

/// Written when a watch starts
pub const STARTED_BANNER: &str = "Watch started...";

/// Written when a watch stops
pub const STOPPED_BANNER: &str = "Watch stopped...";

/// Render one timestamped journal line, without the newline.
///
/// The closing `"` is part of the line format.
pub fn format_line(timestamp: NaiveDateTime, message: &str) -> String {
    format!("[{}] {}\"", timestamp.format(TIMESTAMP_FORMAT), message)
}

/// Journal file opened for appending
pub struct EventJournal {
    path: PathBuf,
    /// Whole lines are written under this lock
    file: Mutex<File>,
}

impl EventJournal {
    /// Open or create the journal at `path`. Existing content is kept.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open journal {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `message` with the current local time
    pub fn append_timestamped(&self, message: &str) -> Result<()> {
        self.append_line(&format_line(Local::now().naive_local(), message))
    }

    /// Append `message` verbatim
    pub fn append_raw(&self, message: &str) -> Result<()> {
        self.append_line(message)
    }

    fn append_line(&self, line: &str) -> Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "{}", line)
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to write journal {}", self.path.display()))
    }
}

impl LogSink for EventJournal {
    fn log_timestamped(&self, message: &str) {
        if let Err(e) = self.append_timestamped(message) {
            warn!("{:#}", e);
        }
    }

    fn log_raw(&self, message: &str) {
        if let Err(e) = self.append_raw(message) {
            warn!("{:#}", e);
        }
    }
}

impl std::fmt::Debug for EventJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventJournal")
            .field("path", &self.path)
            .finish()
    }
}
