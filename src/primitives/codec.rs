#![forbid(unsafe_code)]

//! Slot layout: `[u32 big-endian length][payload][padding]`.
//!
//! A length of zero marks a free slot. There is no other on-disk record of
//! which slots are in use.

use std::ops::Range;

use crate::types::{BagError, Result, ITEM_HEADER_SIZE, MAX_SLOT_SIZE, MIN_SLOT_SIZE};

/// Header written over free slots.
pub const ZERO_HEADER: [u8; ITEM_HEADER_SIZE] = [0; ITEM_HEADER_SIZE];

/// Encodes a payload length as a slot header.
pub fn encode_header(len: u32) -> [u8; ITEM_HEADER_SIZE] {
    len.to_be_bytes()
}

/// Decodes the slot header at the start of `buf`.
///
/// `buf` must hold at least [`ITEM_HEADER_SIZE`] bytes.
pub fn decode_header(buf: &[u8]) -> u32 {
    let mut hdr = [0u8; ITEM_HEADER_SIZE];
    hdr.copy_from_slice(&buf[..ITEM_HEADER_SIZE]);
    u32::from_be_bytes(hdr)
}

/// Byte range of a payload of `len` bytes within its slot.
pub fn payload_window(len: u32) -> Range<usize> {
    ITEM_HEADER_SIZE..ITEM_HEADER_SIZE + len as usize
}

/// Geometry of a bucket file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    slot_size: u32,
}

impl SlotLayout {
    /// Validates `slot_size` and builds the layout.
    pub fn new(slot_size: u32) -> Result<Self> {
        if !(MIN_SLOT_SIZE..=MAX_SLOT_SIZE).contains(&slot_size) {
            return Err(BagError::SlotSize(slot_size as u64));
        }
        Ok(Self { slot_size })
    }

    /// Slot size in bytes.
    pub fn slot_size(&self) -> u32 {
        self.slot_size
    }

    /// File offset of `slot`.
    pub fn offset(&self, slot: u64) -> u64 {
        slot.saturating_mul(self.slot_size as u64)
    }

    /// Number of slots needed to cover `file_len` bytes, counting a partial
    /// trailing slot as a whole one.
    pub fn slots_for_len(&self, file_len: u64) -> u64 {
        file_len.div_ceil(self.slot_size as u64)
    }

    /// Largest payload a slot can hold.
    pub fn max_payload(&self) -> usize {
        self.slot_size as usize - ITEM_HEADER_SIZE
    }

    /// Checks that a payload of `len` bytes is non-empty and fits a slot.
    pub fn check_payload(&self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(BagError::EmptyData);
        }
        if len > self.max_payload() {
            return Err(BagError::Oversized {
                len,
                slot_size: self.slot_size,
            });
        }
        Ok(())
    }

    /// Validates a length header read back from `slot`.
    pub fn check_stored_len(&self, slot: u64, len: u32) -> Result<()> {
        if len as u64 + ITEM_HEADER_SIZE as u64 > self.slot_size as u64 {
            return Err(BagError::CorruptData {
                slot,
                len,
                slot_size: self.slot_size,
            });
        }
        Ok(())
    }
}
