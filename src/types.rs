#![forbid(unsafe_code)]

//! Error type and shared constants.

use std::path::PathBuf;

/// Size of the big-endian length header at the start of every slot.
pub const ITEM_HEADER_SIZE: usize = 4;
/// Smallest accepted slot size: room for the header plus some payload.
pub const MIN_SLOT_SIZE: u32 = (ITEM_HEADER_SIZE * 2) as u32;
/// Largest accepted slot size.
pub const MAX_SLOT_SIZE: u32 = u32::MAX;

/// Errors surfaced by buckets and their building blocks.
#[derive(thiserror::Error, Debug)]
pub enum BagError {
    /// The bucket has been closed.
    #[error("bucket closed")]
    Closed,
    /// Payload plus header does not fit in a slot.
    #[error("data too large for bucket: {len} bytes does not fit slot size {slot_size}")]
    Oversized {
        /// Payload length in bytes.
        len: usize,
        /// Slot size of the bucket.
        slot_size: u32,
    },
    /// Slot index outside the allocated range.
    #[error("bad index: slot {slot}, tail {tail}")]
    BadIndex {
        /// Requested slot.
        slot: u64,
        /// First unallocated slot at the time of the call.
        tail: u64,
    },
    /// Reading a slot failed.
    #[error("bad index: slot {slot}: {source}")]
    BadRead {
        /// Requested slot.
        slot: u64,
        /// Underlying failure.
        #[source]
        source: Box<BagError>,
    },
    /// Zero-length payloads cannot be stored.
    #[error("empty data")]
    EmptyData,
    /// Mutation attempted on a read-only bucket.
    #[error("read-only mode")]
    Readonly,
    /// Header claims more payload than the slot can hold.
    #[error("corrupt data: slot {slot} declares {len} bytes, slot size {slot_size}")]
    CorruptData {
        /// Slot holding the bad header.
        slot: u64,
        /// Declared payload length.
        len: u32,
        /// Slot size of the bucket.
        slot_size: u32,
    },
    /// Slot size outside `[MIN_SLOT_SIZE, MAX_SLOT_SIZE]`.
    #[error("slot size {0} outside [{MIN_SLOT_SIZE}, {MAX_SLOT_SIZE}]")]
    SlotSize(u64),
    /// The bucket path is not a directory.
    #[error("not a directory: '{}'", .0.display())]
    NotADirectory(PathBuf),
    /// The backing file is in a state the scan cannot interpret.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Underlying storage failure.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl BagError {
    /// Returns true for both flavours of bad-index failure.
    pub fn is_bad_index(&self) -> bool {
        matches!(self, BagError::BadIndex { .. } | BagError::BadRead { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BagError>;
