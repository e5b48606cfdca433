//! Source backed by the platform's recommended notify watcher
//! (inotify, FSEvents, ReadDirectoryChangesW)

use super::translate::Translator;
use super::{ChangeSource, SourceFactory};
use crate::error::{Result, WatchError};
use crate::filter::ChangeFilter;
use crate::queue::Feed;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tracing::{debug, warn};

/// Factory for OS-backed sources
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSource;

struct NativeWatch {
    // Dropping the watcher unregisters the watch and stops its thread
    _watcher: RecommendedWatcher,
}

impl ChangeSource for NativeWatch {
    fn backend(&self) -> &'static str {
        "native"
    }
}

impl SourceFactory for NativeSource {
    fn open(
        &self,
        root: &Path,
        recursive: bool,
        filter: ChangeFilter,
        feed: Feed,
    ) -> Result<Box<dyn ChangeSource>> {
        let mut translator = Translator::new(root, filter);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            deliver(&mut translator, &feed, res)
        })
        .map_err(|e| WatchError::open(root, e.to_string()))?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(root, mode)
            .map_err(|e| WatchError::open(root, e.to_string()))?;

        debug!("Native watch registered on {} ({:?})", root.display(), mode);
        Ok(Box::new(NativeWatch { _watcher: watcher }))
    }
}

/// Hand one backend callback to the subscription's queue.
///
/// A rescan flag or an overflow error means the backend lost events; that
/// becomes a zero-byte completion rather than a record or an I/O error.
fn deliver(translator: &mut Translator, feed: &Feed, res: notify::Result<notify::Event>) {
    match res {
        Ok(event) if event.need_rescan() => {
            warn!("Backend dropped events, reporting overflow");
            feed.push_overflow();
        }
        Ok(event) => {
            for (action, name) in translator.translate(&event) {
                feed.push(action, &name);
            }
        }
        Err(err) if is_overflow(&err) => {
            warn!("Backend overflowed: {}", err);
            feed.push_overflow();
        }
        Err(err) => feed.push_error(WatchError::from_notify(err)),
    }
}

fn is_overflow(err: &notify::Error) -> bool {
    match &err.kind {
        notify::ErrorKind::Generic(message) => message.to_lowercase().contains("overflow"),
        _ => false,
    }
}
