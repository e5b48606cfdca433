//! Where decoded events go

use crate::event::ChangeEvent;
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::debug;

/// Receives every decoded event, in order, on the watch thread
pub trait EventSink: Send {
    fn on_event(&mut self, event: ChangeEvent);
}

impl<F> EventSink for F
where
    F: FnMut(ChangeEvent) + Send,
{
    fn on_event(&mut self, event: ChangeEvent) {
        self(event)
    }
}

impl EventSink for Sender<ChangeEvent> {
    fn on_event(&mut self, event: ChangeEvent) {
        if self.send(event).is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }
}

/// Line-oriented log collaborator
pub trait LogSink: Send + Sync {
    /// Write `message` prefixed with the current local time
    fn log_timestamped(&self, message: &str);

    /// Write `message` as-is
    fn log_raw(&self, message: &str);
}

impl<L: LogSink + ?Sized> LogSink for Arc<L> {
    fn log_timestamped(&self, message: &str) {
        (**self).log_timestamped(message)
    }

    fn log_raw(&self, message: &str) {
        (**self).log_raw(message)
    }
}

/// Writes each event's message to a [`LogSink`]
pub struct LogEvents<L> {
    log: L,
}

impl<L: LogSink> LogEvents<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    pub fn into_inner(self) -> L {
        self.log
    }
}

impl<L: LogSink> EventSink for LogEvents<L> {
    fn on_event(&mut self, event: ChangeEvent) {
        self.log.log_timestamped(&event.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl LogSink for Lines {
        fn log_timestamped(&self, message: &str) {
            self.0.lock().push(format!("[ts] {}", message));
        }

        fn log_raw(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    #[test]
    fn test_log_events_renders_messages() {
        let lines = Arc::new(Lines::default());
        let mut sink = LogEvents::new(lines.clone());

        sink.on_event(ChangeEvent::Deleted { name: "x".into() });
        lines.log_raw("Watch stopped...");

        assert_eq!(
            *lines.0.lock(),
            vec!["[ts] Deleted \"x\"".to_string(), "Watch stopped...".to_string()]
        );
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = tx;
        sink.on_event(ChangeEvent::Modified { name: "a".into() });
        assert_eq!(rx.try_recv().unwrap().name(), "a");

        drop(rx);
        sink.on_event(ChangeEvent::Modified { name: "b".into() });
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |event: ChangeEvent| seen.push(event);
            sink.on_event(ChangeEvent::Deleted { name: "x".into() });
        }
        assert_eq!(seen.len(), 1);
    }
}
