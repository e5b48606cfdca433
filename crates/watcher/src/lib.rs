//! Directory change watching for dirwatch
//!
//! This crate provides a cancellable directory watch with:
//! - One outstanding read per subscription, buffer owned by the request
//! - Level-triggered stop that wins over pending data
//! - Record decoding with rename pairing across buffers
//! - Capped retry of transient OS errors

pub mod decode;
pub mod error;
pub mod event;
pub mod filter;
pub mod options;
pub mod platform;
mod queue;
pub mod record;
pub mod sink;
pub mod stop;
pub mod subscription;
pub mod watch_loop;

pub use decode::{DecodeSummary, Decoder, DirClassification, EventPolicy};
pub use error::{Result, WatchError};
pub use event::{ChangeEvent, EventKind};
pub use filter::ChangeFilter;
pub use options::{RetryPolicy, WatchOptions, DEFAULT_BUFFER_SIZE, MIN_READ_BUFFER};
pub use platform::{ChangeSource, ManualController, ManualSource, NativeSource, SourceFactory};
pub use queue::{Feed, DEFAULT_BACKLOG_BYTES};
pub use sink::{EventSink, LogEvents, LogSink};
pub use stop::StopHandle;
pub use subscription::{Batch, Subscription, WaitOutcome};
pub use watch_loop::{LoopReport, LoopState, WatchLoop};

use std::path::Path;
use std::thread::{self, JoinHandle};
use tracing::error;

/// A watch running on its own thread
pub struct WatchHandle {
    stop: StopHandle,
    thread: Option<JoinHandle<Result<LoopReport>>>,
}

impl WatchHandle {
    /// Stop the watch and wait for its thread
    pub fn stop(mut self) -> Result<LoopReport> {
        self.stop.request_stop();
        self.join()
    }

    /// Handle that stops this watch from anywhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Whether the loop has ended on its own (error) or after a stop
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    fn join(&mut self) -> Result<LoopReport> {
        match self.thread.take() {
            Some(thread) => match thread.join() {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("Watch thread panicked: {}", message);
                    Err(WatchError::Panicked { message })
                }
            },
            None => Err(WatchError::Closed),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop.request_stop();
            let _ = self.join();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Watch `path` with the native source, delivering events to `sink` on a
/// background thread.
///
/// Open errors are returned here; errors after that come back from
/// [`WatchHandle::stop`].
pub fn start_watch<S>(path: &Path, options: WatchOptions, sink: S) -> Result<WatchHandle>
where
    S: EventSink + 'static,
{
    start_watch_with(path, options, &NativeSource, sink)
}

/// [`start_watch`] with an explicit source
pub fn start_watch_with<S>(
    path: &Path,
    options: WatchOptions,
    factory: &dyn SourceFactory,
    sink: S,
) -> Result<WatchHandle>
where
    S: EventSink + 'static,
{
    options.validate()?;

    let stop = StopHandle::new();
    let subscription = Subscription::open_with(
        path,
        options.recursive,
        options.filter,
        options.backlog_bytes,
        factory,
        stop.clone(),
    )?;
    let decoder = Decoder::new(path, options.policy.clone());
    let watch = WatchLoop::new(subscription, decoder, sink, options);

    let thread = thread::Builder::new()
        .name("dirwatch-loop".to_string())
        .spawn(move || watch.run())
        .map_err(|e| WatchError::io(&e))?;

    Ok(WatchHandle {
        stop,
        thread: Some(thread),
    })
}
