//! Request queue shared between a subscription and its OS source
//!
//! The source pushes records as the OS reports them. They wait in a bounded
//! backlog until the subscription arms a read, at which point as many whole
//! records as fit are packed into the armed buffer and the read completes.

use crate::error::{Result, WatchError};
use crate::record::{Action, EncodedRecord, RecordWriter};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Default backlog capacity in encoded bytes
pub const DEFAULT_BACKLOG_BYTES: usize = 64 * 1024;

/// Outcome of one armed read, sent to the waiting subscription
pub(crate) enum Completion {
    Data { buffer: Vec<u8>, transferred: usize },
    Failed { buffer: Vec<u8>, error: WatchError },
    Canceled,
}

#[derive(Default)]
struct QueueState {
    /// Buffer of the outstanding read, if any
    pending: Option<Vec<u8>>,
    backlog: VecDeque<EncodedRecord>,
    backlog_bytes: usize,
    overflowed: bool,
    error: Option<WatchError>,
    canceled: bool,
}

pub(crate) struct RequestQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    completions: Sender<Completion>,
}

impl RequestQueue {
    pub(crate) fn new(capacity: usize) -> (Arc<Self>, Receiver<Completion>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let queue = Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            capacity,
            completions: tx,
        });
        (queue, rx)
    }

    /// Arm a read into `buffer`. Completes immediately when records, an
    /// overflow or an error are already waiting.
    pub(crate) fn submit(&self, buffer: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock();

        if state.pending.is_some() {
            return Err(WatchError::AlreadyArmed);
        }
        if state.canceled {
            let _ = self.completions.send(Completion::Canceled);
            return Ok(());
        }

        state.pending = Some(buffer);
        self.try_complete(&mut state);
        Ok(())
    }

    /// Cancel the outstanding read and refuse all future ones
    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock();
        state.canceled = true;
        state.backlog.clear();
        state.backlog_bytes = 0;
        state.error = None;
        if state.pending.take().is_some() {
            let _ = self.completions.send(Completion::Canceled);
        }
    }

    pub(crate) fn is_canceled(&self) -> bool {
        self.state.lock().canceled
    }

    fn push_record(&self, record: EncodedRecord) {
        let mut state = self.state.lock();
        if state.canceled {
            return;
        }

        state.backlog_bytes += record.len();
        state.backlog.push_back(record);

        if state.backlog_bytes > self.capacity {
            warn!(
                "Notification backlog overflowed ({} bytes), dropping {} records",
                state.backlog_bytes,
                state.backlog.len()
            );
            state.backlog.clear();
            state.backlog_bytes = 0;
            state.overflowed = true;
        }

        self.try_complete(&mut state);
    }

    fn push_error(&self, error: WatchError) {
        let mut state = self.state.lock();
        if state.canceled {
            return;
        }
        if let Some(previous) = state.error.replace(error) {
            debug!("Superseding undelivered source error: {}", previous);
        }
        self.try_complete(&mut state);
    }

    fn push_overflow(&self) {
        let mut state = self.state.lock();
        if state.canceled {
            return;
        }
        state.backlog.clear();
        state.backlog_bytes = 0;
        state.overflowed = true;
        self.try_complete(&mut state);
    }

    fn try_complete(&self, state: &mut QueueState) {
        if state.pending.is_none() {
            return;
        }

        let completion = if state.overflowed {
            state.overflowed = false;
            let buffer = state.pending.take().unwrap_or_default();
            Completion::Data {
                buffer,
                transferred: 0,
            }
        } else if !state.backlog.is_empty() {
            let mut buffer = state.pending.take().unwrap_or_default();
            let transferred = pack(state, &mut buffer);
            Completion::Data {
                buffer,
                transferred,
            }
        } else if let Some(error) = state.error.take() {
            let buffer = state.pending.take().unwrap_or_default();
            Completion::Failed { buffer, error }
        } else {
            return;
        };

        let _ = self.completions.send(completion);
    }
}

/// Move as many whole backlog records as fit into `buffer`
fn pack(state: &mut QueueState, buffer: &mut [u8]) -> usize {
    let capacity = buffer.len();
    let mut writer = RecordWriter::new(buffer);
    while let Some(record) = state.backlog.front() {
        if !writer.try_push(record) {
            break;
        }
        let len = record.len();
        state.backlog.pop_front();
        state.backlog_bytes -= len;
    }

    if writer.is_empty() {
        // The head record is larger than the whole buffer; it can never be
        // delivered, so report it as an overflow.
        if let Some(record) = state.backlog.pop_front() {
            state.backlog_bytes -= record.len();
            warn!(
                "Dropping {}-byte record larger than the {}-byte read buffer",
                record.len(),
                capacity
            );
        }
    }

    writer.len()
}

/// Delivery handle given to a change source.
///
/// A feed does not keep its subscription alive: once the subscription is
/// closed, pushes are silently discarded.
#[derive(Clone)]
pub struct Feed {
    queue: Weak<RequestQueue>,
}

impl Feed {
    pub(crate) fn new(queue: &Arc<RequestQueue>) -> Self {
        Self {
            queue: Arc::downgrade(queue),
        }
    }

    /// Deliver a record with a known action
    pub fn push(&self, action: Action, name: &str) {
        self.push_code(action.code(), name);
    }

    /// Deliver a record with a raw action code
    pub fn push_code(&self, code: u32, name: &str) {
        if let Some(queue) = self.queue.upgrade() {
            queue.push_record(EncodedRecord::new(code, name));
        }
    }

    /// Report an error from the OS source; delivered on the next wait
    pub fn push_error(&self, error: WatchError) {
        if let Some(queue) = self.queue.upgrade() {
            queue.push_error(error);
        }
    }

    /// Report that the OS dropped notifications
    pub fn push_overflow(&self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.push_overflow();
        }
    }

    /// Whether the subscription behind this feed is gone or canceled
    pub fn is_closed(&self) -> bool {
        self.queue
            .upgrade()
            .map_or(true, |queue| queue.is_canceled())
    }
}
