//! Level-triggered stop signal shared by a watch and its controller

use crate::queue::RequestQueue;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

/// Handle used to stop a watch from any thread.
///
/// Stopping drops the only sender of an internal channel. A disconnected
/// receiver is ready forever, so a stop issued before a wait begins is seen by
/// that wait just like one issued during it.
#[derive(Clone)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

struct StopInner {
    requested: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    /// Queue of the subscription this handle controls, once attached
    queue: Mutex<Option<Weak<RequestQueue>>>,
}

impl StopHandle {
    /// Create a handle not yet bound to a subscription.
    ///
    /// A stop requested before the subscription is opened takes effect as
    /// soon as it attaches.
    pub fn new() -> Self {
        let (trigger, signal) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(StopInner {
                requested: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                signal,
                queue: Mutex::new(None),
            }),
        }
    }

    /// Request the watch to stop. Idempotent.
    pub fn request_stop(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            debug!("Stop requested");
        }
        drop(self.inner.trigger.lock().take());

        let queue = self.inner.queue.lock().as_ref().and_then(Weak::upgrade);
        if let Some(queue) = queue {
            queue.cancel();
        }
    }

    /// Whether a stop has been requested
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`, waking early on stop.
    ///
    /// Returns true if a stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.signal.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_requested(),
        }
    }

    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    pub(crate) fn attach(&self, queue: &Arc<RequestQueue>) {
        let mut slot = self.inner.queue.lock();
        *slot = Some(Arc::downgrade(queue));
        if self.is_requested() {
            queue.cancel();
        }
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("requested", &self.is_requested())
            .finish()
    }
}
