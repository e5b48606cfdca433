//! Change-kind filter for a subscription

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Which kinds of change a subscription reports.
    ///
    /// Bit values match the `FILE_NOTIFY_CHANGE_*` constants so a filter can
    /// be handed to a native ReadDirectoryChangesW source unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ChangeFilter: u32 {
        /// File creation, deletion and rename
        const FILE_NAME = 0x0000_0001;
        /// Directory creation, deletion and rename
        const DIR_NAME = 0x0000_0002;
        /// Attribute changes
        const ATTRIBUTES = 0x0000_0004;
        /// File size changes
        const SIZE = 0x0000_0008;
        /// Last-write time changes
        const LAST_WRITE = 0x0000_0010;
        /// Creation time changes
        const CREATION = 0x0000_0040;
    }
}

impl ChangeFilter {
    /// Whether name changes (create/delete/rename) are reported for the
    /// given entry kind. `None` means the kind is not known.
    pub fn wants_name_change(self, is_dir: Option<bool>) -> bool {
        match is_dir {
            Some(true) => self.contains(Self::DIR_NAME),
            Some(false) => self.contains(Self::FILE_NAME),
            None => self.intersects(Self::FILE_NAME | Self::DIR_NAME),
        }
    }

    /// Whether content modifications are reported
    pub fn wants_write(self) -> bool {
        self.intersects(Self::LAST_WRITE | Self::SIZE)
    }

    /// Whether metadata-only modifications are reported
    pub fn wants_attributes(self) -> bool {
        self.intersects(Self::ATTRIBUTES | Self::CREATION)
    }
}

impl Default for ChangeFilter {
    fn default() -> Self {
        Self::FILE_NAME | Self::DIR_NAME | Self::LAST_WRITE
    }
}
