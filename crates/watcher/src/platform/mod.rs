//! OS notification sources
//!
//! A source owns the live OS registration for one watched root and pushes
//! raw records into the subscription's [`Feed`]. Dropping the source releases
//! the registration.

pub mod manual;
pub mod native;
mod translate;

use crate::error::Result;
use crate::filter::ChangeFilter;
use crate::queue::Feed;
use std::path::Path;

pub use manual::{ManualController, ManualSource};
pub use native::NativeSource;

/// A live OS-level watch. Not clonable; dropping it releases the watch.
pub trait ChangeSource: Send {
    /// Short backend name for diagnostics
    fn backend(&self) -> &'static str;
}

/// Opens change sources for a subscription
pub trait SourceFactory {
    /// Start delivering changes under `root` into `feed`.
    ///
    /// On error nothing may be left registered with the OS.
    fn open(
        &self,
        root: &Path,
        recursive: bool,
        filter: ChangeFilter,
        feed: Feed,
    ) -> Result<Box<dyn ChangeSource>>;
}
