//! Error taxonomy for the watch engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by a subscription or the loop driving it
#[derive(Debug, Error)]
pub enum WatchError {
    /// The subscription could not be established (missing path, access
    /// denied, resource allocation failure). Fatal to that watch.
    #[error("cannot watch {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    /// A wait or arm failed inside the OS source
    #[error("watch I/O error{}: {message}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Io {
        code: Option<i32>,
        message: String,
        transient: bool,
    },

    /// Operation attempted on a closed subscription
    #[error("subscription is closed")]
    Closed,

    /// A read was armed while the previous one was still outstanding
    #[error("a read is already outstanding on this subscription")]
    AlreadyArmed,

    /// `wait` was called with no read armed
    #[error("no read is armed on this subscription")]
    NotArmed,

    /// Options that cannot drive a watch
    #[error("invalid watch options: {reason}")]
    InvalidOptions { reason: String },

    /// The watch thread panicked, usually inside the sink
    #[error("watch thread panicked: {message}")]
    Panicked { message: String },

    /// The retry cap was reached on consecutive I/O errors
    #[error("giving up after {attempts} consecutive I/O errors: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<WatchError>,
    },
}

impl WatchError {
    /// Create an open error
    pub fn open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a std I/O error; treated as transient
    pub fn io(err: &std::io::Error) -> Self {
        Self::Io {
            code: err.raw_os_error(),
            message: err.to_string(),
            transient: true,
        }
    }

    /// Translate an error reported by the notify backend
    pub fn from_notify(err: notify::Error) -> Self {
        use notify::ErrorKind;

        match err.kind {
            ErrorKind::Io(ref io) => Self::Io {
                code: io.raw_os_error(),
                message: io.to_string(),
                transient: true,
            },
            ErrorKind::Generic(ref message) => Self::Io {
                code: None,
                message: message.clone(),
                transient: true,
            },
            // Root gone, watch limit reached or bad configuration;
            // retrying cannot help.
            _ => Self::Io {
                code: None,
                message: err.to_string(),
                transient: false,
            },
        }
    }

    /// Whether the loop should back off and retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { transient: true, .. })
    }
}

/// Result type for watch operations
pub type Result<T> = std::result::Result<T, WatchError>;
