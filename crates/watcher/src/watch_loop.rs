//! The arm / wait / decode cycle
//!
//! Idle → Armed → Draining → Idle, until a stop or an unrecoverable error
//! moves the loop to Stopped.

use crate::decode::Decoder;
use crate::error::{Result, WatchError};
use crate::options::WatchOptions;
use crate::sink::EventSink;
use crate::subscription::{Subscription, WaitOutcome};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Where the loop is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Armed,
    Draining,
    Stopped,
}

/// Counters for a finished loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    /// Completions with data, empty ones included
    pub batches: u64,
    pub events: u64,
    /// Zero-byte completions (overflow or nothing to report)
    pub empty_batches: u64,
    pub anomalies: u64,
}

/// Drives one subscription until stopped
pub struct WatchLoop<S> {
    subscription: Subscription,
    decoder: Decoder,
    sink: S,
    options: WatchOptions,
    state: LoopState,
    report: LoopReport,
}

impl<S: EventSink> WatchLoop<S> {
    pub fn new(subscription: Subscription, decoder: Decoder, sink: S, options: WatchOptions) -> Self {
        Self {
            subscription,
            decoder,
            sink,
            options,
            state: LoopState::Idle,
            report: LoopReport::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until a stop is requested or an unrecoverable error occurs.
    /// The subscription is closed on return either way.
    pub fn run(mut self) -> Result<LoopReport> {
        let result = self.cycle();
        self.state = LoopState::Stopped;
        self.subscription.close();

        match &result {
            Ok(report) => info!(
                "Watch on {} stopped: {} batches, {} events",
                self.subscription.root().display(),
                report.batches,
                report.events
            ),
            Err(e) => warn!(
                "Watch on {} ended with error: {}",
                self.subscription.root().display(),
                e
            ),
        }
        result
    }

    fn cycle(&mut self) -> Result<LoopReport> {
        let stop = self.subscription.stop_handle();
        let timeout = self.options.wait_timeout();
        let mut buffer = vec![0u8; self.options.buffer_size];
        let mut failures: u32 = 0;

        loop {
            if stop.is_requested() {
                return Ok(self.report);
            }

            // Idle → Armed
            if let Err(e) = self.subscription.arm_read(buffer) {
                if !e.is_transient() {
                    return Err(e);
                }
                failures += 1;
                if !self.back_off(e, failures)? {
                    return Ok(self.report);
                }
                buffer = vec![0u8; self.options.buffer_size];
                continue;
            }
            self.state = LoopState::Armed;

            let outcome = loop {
                match self.subscription.wait(timeout)? {
                    WaitOutcome::TimedOut => {
                        trace!("Still watching {}", self.subscription.root().display());
                    }
                    WaitOutcome::Stopped => return Ok(self.report),
                    WaitOutcome::DataReady(batch) => break Ok(batch),
                    WaitOutcome::Failed { buffer, error } => break Err((buffer, error)),
                }
            };

            match outcome {
                Ok(batch) => {
                    failures = 0;
                    self.report.batches += 1;
                    if batch.is_empty() {
                        debug!("Empty batch, changes may have been dropped");
                        self.report.empty_batches += 1;
                    } else {
                        self.state = LoopState::Draining;
                        let sink = &mut self.sink;
                        let summary = self.decoder.decode(
                            batch.bytes(),
                            || stop.is_requested(),
                            |event| sink.on_event(event),
                        );
                        self.report.events += summary.emitted as u64;
                        self.report.anomalies += summary.anomalies as u64;
                        if summary.interrupted {
                            return Ok(self.report);
                        }
                    }
                    buffer = batch.into_buffer();
                }
                Err((returned, error)) => {
                    buffer = returned;
                    if !error.is_transient() {
                        return Err(error);
                    }
                    failures += 1;
                    if !self.back_off(error, failures)? {
                        return Ok(self.report);
                    }
                }
            }
            self.state = LoopState::Idle;
        }
    }

    /// Sleep before the next attempt. `Ok(false)` means a stop arrived while
    /// backing off.
    fn back_off(&mut self, error: WatchError, failures: u32) -> Result<bool> {
        let retry = &self.options.retry;
        if retry.exhausted(failures) {
            return Err(WatchError::RetriesExhausted {
                attempts: failures,
                last: Box::new(error),
            });
        }

        let backoff: Duration = retry.backoff();
        warn!(
            "Watch error (attempt {}), retrying in {:?}: {}",
            failures, backoff, error
        );
        self.state = LoopState::Idle;
        Ok(!self.subscription.stop_handle().wait_timeout(backoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::EventPolicy;
    use crate::event::ChangeEvent;
    use crate::filter::ChangeFilter;
    use crate::platform::{ManualController, ManualSource};
    use crate::queue::DEFAULT_BACKLOG_BYTES;
    use crate::record::Action;
    use crate::stop::StopHandle;
    use std::thread;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Subscription, ManualController) {
        let (factory, controller) = ManualSource::new();
        let sub = Subscription::open_with(
            dir.path(),
            true,
            ChangeFilter::default(),
            DEFAULT_BACKLOG_BYTES,
            &factory,
            StopHandle::new(),
        )
        .unwrap();
        (sub, controller)
    }

    fn fast_retry(max_attempts: Option<u32>) -> WatchOptions {
        let mut options = WatchOptions::default();
        options.retry.backoff_ms = 5;
        options.retry.max_attempts = max_attempts;
        options
    }

    #[test]
    fn test_stop_before_run_emits_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let (sub, controller) = setup(&temp_dir);
        controller.push(Action::Added, "a.txt");
        sub.request_stop();

        let mut events = Vec::new();
        let report = WatchLoop::new(
            sub,
            Decoder::new(temp_dir.path(), EventPolicy::default()),
            |e: ChangeEvent| events.push(e),
            WatchOptions::default(),
        )
        .run()
        .unwrap();

        assert!(events.is_empty());
        assert_eq!(report.batches, 0);
        assert_eq!(controller.live_sources(), 0);
    }

    #[test]
    fn test_transient_errors_exhaust_retries() {
        let temp_dir = TempDir::new().unwrap();
        let (sub, controller) = setup(&temp_dir);
        let stop = sub.stop_handle();

        let pusher = thread::spawn(move || {
            for _ in 0..50 {
                controller.push_error(WatchError::io(&std::io::Error::from_raw_os_error(5)));
                if stop.wait_timeout(Duration::from_millis(2)) {
                    break;
                }
            }
            controller
        });

        let result = WatchLoop::new(
            sub,
            Decoder::new(temp_dir.path(), EventPolicy::default()),
            |_e: ChangeEvent| {},
            fast_retry(Some(3)),
        )
        .run();

        match result {
            Err(WatchError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.is_transient());
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let controller = pusher.join().unwrap();
        assert_eq!(controller.live_sources(), 0);
    }

    #[test]
    fn test_fatal_error_ends_loop() {
        let temp_dir = TempDir::new().unwrap();
        let (sub, controller) = setup(&temp_dir);
        controller.push_error(WatchError::Io {
            code: None,
            message: "watch root removed".into(),
            transient: false,
        });

        let result = WatchLoop::new(
            sub,
            Decoder::new(temp_dir.path(), EventPolicy::default()),
            |_e: ChangeEvent| {},
            fast_retry(None),
        )
        .run();

        assert!(matches!(result, Err(WatchError::Io { transient: false, .. })));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let temp_dir = TempDir::new().unwrap();
        let (sub, controller) = setup(&temp_dir);
        let stop = sub.stop_handle();
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = thread::spawn(move || {
            WatchLoop::new(
                sub,
                Decoder::new(temp_dir.path(), EventPolicy::default()),
                tx,
                fast_retry(Some(2)),
            )
            .run()
        });

        // Error, success, error, success: never two failures in a row
        let io = || WatchError::io(&std::io::Error::from_raw_os_error(5));
        controller.push_error(io());
        thread::sleep(Duration::from_millis(30));
        controller.push(Action::Removed, "a.txt");
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        controller.push_error(io());
        thread::sleep(Duration::from_millis(30));
        controller.push(Action::Removed, "b.txt");
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

        stop.request_stop();
        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.events, 2);
    }
}
