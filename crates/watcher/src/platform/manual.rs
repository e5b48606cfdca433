//! In-process source driven by hand
//!
//! Lets callers exercise the full subscription and loop machinery without
//! touching the filesystem: records, errors and overflows are injected
//! through a [`ManualController`].

use super::{ChangeSource, SourceFactory};
use crate::error::{Result, WatchError};
use crate::filter::ChangeFilter;
use crate::queue::Feed;
use crate::record::Action;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Shared {
    feed: Mutex<Option<Feed>>,
    live: AtomicUsize,
    fail_next_open: AtomicBool,
}

/// Factory for manual sources
pub struct ManualSource {
    shared: Arc<Shared>,
}

/// Injects changes into the subscription opened by a [`ManualSource`]
#[derive(Clone)]
pub struct ManualController {
    shared: Arc<Shared>,
}

impl ManualSource {
    pub fn new() -> (Self, ManualController) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: shared.clone(),
            },
            ManualController { shared },
        )
    }
}

struct ManualWatch {
    shared: Arc<Shared>,
}

impl ChangeSource for ManualWatch {
    fn backend(&self) -> &'static str {
        "manual"
    }
}

impl Drop for ManualWatch {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
        self.shared.feed.lock().take();
    }
}

impl SourceFactory for ManualSource {
    fn open(
        &self,
        root: &Path,
        _recursive: bool,
        _filter: ChangeFilter,
        feed: Feed,
    ) -> Result<Box<dyn ChangeSource>> {
        if self.shared.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(WatchError::open(root, "simulated source failure"));
        }

        *self.shared.feed.lock() = Some(feed);
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ManualWatch {
            shared: self.shared.clone(),
        }))
    }
}

impl ManualController {
    /// Deliver a record with a known action
    pub fn push(&self, action: Action, name: &str) {
        self.push_code(action.code(), name);
    }

    /// Deliver a record with a raw, possibly unknown, action code
    pub fn push_code(&self, code: u32, name: &str) {
        match self.feed() {
            Some(feed) => feed.push_code(code, name),
            None => debug!("No manual watch open, dropping record {:?}", name),
        }
    }

    /// Report an I/O error on the next wait
    pub fn push_error(&self, error: WatchError) {
        if let Some(feed) = self.feed() {
            feed.push_error(error);
        }
    }

    /// Make the next read complete with zero bytes
    pub fn push_overflow(&self) {
        if let Some(feed) = self.feed() {
            feed.push_overflow();
        }
    }

    /// Make the next `open` fail
    pub fn fail_next_open(&self) {
        self.shared.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Number of sources currently open
    pub fn live_sources(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    fn feed(&self) -> Option<Feed> {
        self.shared.feed.lock().clone()
    }
}
