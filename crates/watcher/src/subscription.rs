//! One OS-level watch on one directory subtree
//!
//! A [`Subscription`] owns the source registration, the request queue and
//! the completion channel. Reads are armed by moving a buffer into the
//! subscription; the buffer comes back with the completion, so it can never
//! be touched while the read is outstanding.

use crate::error::{Result, WatchError};
use crate::filter::ChangeFilter;
use crate::platform::{ChangeSource, NativeSource, SourceFactory};
use crate::queue::{Completion, Feed, RequestQueue, DEFAULT_BACKLOG_BYTES};
use crate::stop::StopHandle;
use crossbeam_channel::{select, Receiver};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// A completed read
#[derive(Debug)]
pub struct Batch {
    buffer: Vec<u8>,
    len: usize,
}

impl Batch {
    /// The transferred bytes
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Transferred byte count
    pub fn len(&self) -> usize {
        self.len
    }

    /// A zero-byte completion: nothing to decode, re-arm
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Take the buffer back for the next read
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

/// Result of waiting on an armed read
#[derive(Debug)]
pub enum WaitOutcome {
    DataReady(Batch),
    Stopped,
    TimedOut,
    /// The read failed; the buffer is handed back for a retry
    Failed { buffer: Vec<u8>, error: WatchError },
}

/// Live watch on a directory
pub struct Subscription {
    root: PathBuf,
    /// `None` once closed
    source: Option<Box<dyn ChangeSource>>,
    queue: std::sync::Arc<RequestQueue>,
    completions: Receiver<Completion>,
    stop: StopHandle,
    armed: bool,
}

impl Subscription {
    /// Watch `path` with the platform's native source
    pub fn open(path: &Path, recursive: bool, filter: ChangeFilter) -> Result<Self> {
        Self::open_with(
            path,
            recursive,
            filter,
            DEFAULT_BACKLOG_BYTES,
            &NativeSource,
            StopHandle::new(),
        )
    }

    /// Watch `path` with an explicit source and stop handle.
    ///
    /// A stop already requested on `stop` makes every read complete as
    /// canceled.
    pub fn open_with(
        path: &Path,
        recursive: bool,
        filter: ChangeFilter,
        backlog_bytes: usize,
        factory: &dyn SourceFactory,
        stop: StopHandle,
    ) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|e| WatchError::open(path, e.to_string()))?;
        if !meta.is_dir() {
            return Err(WatchError::open(path, "not a directory"));
        }

        let (queue, completions) = RequestQueue::new(backlog_bytes);
        // On failure the queue and channel are dropped here; the factory
        // guarantees it left nothing registered.
        let source = factory.open(path, recursive, filter, Feed::new(&queue))?;
        stop.attach(&queue);

        info!(
            "Watching {} ({}, {})",
            path.display(),
            if recursive { "recursive" } else { "top level only" },
            source.backend()
        );

        Ok(Self {
            root: path.to_path_buf(),
            source: Some(source),
            queue,
            completions,
            stop,
            armed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle for stopping this subscription from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Whether a read is outstanding
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arm a read into `buffer`.
    ///
    /// At most one read may be outstanding; it must be observed complete by
    /// [`wait`](Self::wait) before the next arm. Arming twice panics in
    /// debug builds and returns [`WatchError::AlreadyArmed`] otherwise.
    pub fn arm_read(&mut self, buffer: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        debug_assert!(!self.armed, "read already outstanding");
        if self.armed {
            error!("arm_read called while a read is outstanding on {}", self.root.display());
            return Err(WatchError::AlreadyArmed);
        }

        self.queue.submit(buffer)?;
        self.armed = true;
        Ok(())
    }

    /// Block until the armed read completes, a stop is requested, or
    /// `timeout` elapses. A stop wins over a completion seen at the same
    /// time.
    ///
    /// Once a stop is requested every wait reports it; otherwise waiting
    /// with no read armed is [`WatchError::NotArmed`].
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<WaitOutcome> {
        self.ensure_open()?;
        if self.stop.is_requested() {
            self.armed = false;
            return Ok(WaitOutcome::Stopped);
        }
        if !self.armed {
            error!("wait called with no read armed on {}", self.root.display());
            return Err(WatchError::NotArmed);
        }

        let deadline = match timeout {
            Some(timeout) => crossbeam_channel::after(timeout),
            None => crossbeam_channel::never(),
        };

        let woke = select! {
            recv(self.stop.signal()) -> _ => Woke::Stop,
            recv(self.completions) -> msg => match msg {
                Ok(completion) => Woke::Completed(completion),
                Err(_) => Woke::Stop,
            },
            recv(deadline) -> _ => Woke::Timeout,
        };

        if self.stop.is_requested() {
            self.armed = false;
            return Ok(WaitOutcome::Stopped);
        }

        let outcome = match woke {
            Woke::Stop => {
                self.armed = false;
                WaitOutcome::Stopped
            }
            Woke::Timeout => WaitOutcome::TimedOut,
            Woke::Completed(completion) => {
                self.armed = false;
                match completion {
                    Completion::Data {
                        buffer,
                        transferred,
                    } => WaitOutcome::DataReady(Batch {
                        buffer,
                        len: transferred,
                    }),
                    Completion::Failed { buffer, error } => WaitOutcome::Failed { buffer, error },
                    Completion::Canceled => WaitOutcome::Stopped,
                }
            }
        };
        Ok(outcome)
    }

    /// Request a stop. Same as calling it on [`stop_handle`](Self::stop_handle).
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Release the source and cancel any outstanding read. Idempotent.
    pub fn close(&mut self) {
        if let Some(source) = self.source.take() {
            debug!("Closing {} watch on {}", source.backend(), self.root.display());
            drop(source);
            self.queue.cancel();
            self.armed = false;
        }
    }

    /// Use after close panics in debug builds
    fn ensure_open(&self) -> Result<()> {
        debug_assert!(self.source.is_some(), "subscription is closed");
        if self.source.is_none() {
            error!("Operation on closed subscription for {}", self.root.display());
            return Err(WatchError::Closed);
        }
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("root", &self.root)
            .field("closed", &self.is_closed())
            .field("armed", &self.armed)
            .finish()
    }
}

enum Woke {
    Stop,
    Completed(Completion),
    Timeout,
}
