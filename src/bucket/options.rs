#![forbid(unsafe_code)]

use crate::primitives::codec::SlotLayout;
use crate::types::Result;

/// Default slot size used by [`BucketOptions::default`].
pub const DEFAULT_SLOT_SIZE: u32 = 4096;

/// Configuration options supplied when opening a [`super::Bucket`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketOptions {
    /// Size of every slot in bytes, header included
    pub slot_size: u32,
    /// Open without write access; mutations fail with `Readonly`
    pub readonly: bool,
    /// Whether close should fsync after persisting the free list
    pub sync_on_close: bool,
}

impl Default for BucketOptions {
    fn default() -> Self {
        Self {
            slot_size: DEFAULT_SLOT_SIZE,
            readonly: false,
            sync_on_close: true,
        }
    }
}

impl BucketOptions {
    /// Creates options for the given slot size.
    pub fn new(slot_size: u32) -> Self {
        Self {
            slot_size,
            ..Default::default()
        }
    }

    /// Sets the slot size.
    pub fn slot_size(mut self, slot_size: u32) -> Self {
        self.slot_size = slot_size;
        self
    }

    /// Sets read-only mode.
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Sets whether close syncs the file.
    pub fn sync_on_close(mut self, sync: bool) -> Self {
        self.sync_on_close = sync;
        self
    }

    /// Checks the slot size bounds and returns the resulting layout.
    pub fn validate(&self) -> Result<SlotLayout> {
        SlotLayout::new(self.slot_size)
    }
}
