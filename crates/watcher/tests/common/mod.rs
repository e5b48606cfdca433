//! Shared helpers for watcher integration tests

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use std::time::Duration;
use watcher::ChangeEvent;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive events until `pred` matches or the timeout elapses
pub fn recv_until<F>(rx: &Receiver<ChangeEvent>, mut pred: F) -> Vec<ChangeEvent>
where
    F: FnMut(&ChangeEvent) -> bool,
{
    let mut seen = Vec::new();
    while let Ok(event) = rx.recv_timeout(RECV_TIMEOUT) {
        let done = pred(&event);
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

/// Drain whatever arrives within `window`
pub fn drain(rx: &Receiver<ChangeEvent>, window: Duration) -> Vec<ChangeEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.recv_timeout(window) {
        seen.push(event);
    }
    seen
}
