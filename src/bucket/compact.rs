#![forbid(unsafe_code)]

//! Open-time recovery and compaction.
//!
//! The free list is never persisted on its own: free slots carry a zero
//! length header, so a linear scan of the headers rebuilds it. While
//! scanning, live records from the end of the file are moved into free
//! slots near the start, and the file is truncated once at the end.

use tracing::{debug, trace, warn};

use crate::primitives::codec::{decode_header, payload_window, SlotLayout};
use crate::primitives::gaps::Gaps;
use crate::primitives::io::FileIo;
use crate::types::{BagError, Result, ITEM_HEADER_SIZE};

/// Result of the open-time scan.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ScanOutcome {
    /// New first unallocated slot.
    pub(crate) tail: u64,
    /// Free slots below `tail`. Always empty after a writable compaction.
    pub(crate) gaps: Gaps,
    /// Records relocated into lower slots.
    pub(crate) moved: u64,
}

/// Reads `slot` into `buf` (one slot long) and returns its payload length,
/// or `None` if the file ends before the header or the declared payload does.
///
/// The last slot of a file is usually short since only the header and payload
/// are written; the missing bytes read as zero.
fn try_read_slot<F: FileIo>(
    io: &F,
    layout: &SlotLayout,
    slot: u64,
    buf: &mut [u8],
) -> Result<Option<u32>> {
    let read = io.read_at_most(layout.offset(slot), buf)?;
    if read < ITEM_HEADER_SIZE {
        trace!(slot, read, "bucket.read_slot.short");
        return Ok(None);
    }
    let len = decode_header(buf);
    layout.check_stored_len(slot, len)?;
    if read < ITEM_HEADER_SIZE + len as usize {
        trace!(slot, read, len, "bucket.read_slot.short_payload");
        return Ok(None);
    }
    buf[read..].fill(0);
    Ok(Some(len))
}

/// Reads a slot of a bucket that is in use. Every slot below the tail that
/// is not on the free list has been written in full, so a short one is
/// corruption.
pub(crate) fn read_slot<F: FileIo>(
    io: &F,
    layout: &SlotLayout,
    slot: u64,
    buf: &mut [u8],
) -> Result<u32> {
    try_read_slot(io, layout, slot, buf)?
        .ok_or(BagError::Corruption("slot cut short by end of file"))
}

/// Reads a slot during the open-time scan.
///
/// Only the last slot can end early, and only when a put was interrupted
/// between writing the header and the payload. Such a record was never
/// acknowledged, so the slot counts as free and compaction drops it.
fn scan_slot<F: FileIo>(io: &F, layout: &SlotLayout, slot: u64, buf: &mut [u8]) -> Result<u32> {
    match try_read_slot(io, layout, slot, buf)? {
        Some(len) => Ok(len),
        None => {
            warn!(slot, "bucket.compact.torn_tail");
            Ok(0)
        }
    }
}

/// Scans `[0, tail)`, reporting every live record to `visit` exactly once.
///
/// In writable mode the scan runs two cursors towards each other: `gap`
/// searches upwards for a free slot, `end` searches downwards for a live one,
/// which is then copied into the gap. Every slot below `gap` is live and every
/// slot at or above `end` is free or already moved, so once the cursors meet
/// `end` is the new tail. Each slot is read at most once and written at most
/// once. In read-only mode only the upward scan runs and free slots are
/// collected instead of filled.
pub(crate) fn compact<F: FileIo>(
    io: &F,
    layout: SlotLayout,
    tail: u64,
    readonly: bool,
    visit: &mut dyn FnMut(u64, &[u8]),
) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome {
        tail,
        ..Default::default()
    };
    if tail == 0 {
        return Ok(outcome);
    }
    let mut buf = vec![0u8; layout.slot_size() as usize];

    if readonly {
        for slot in 0..tail {
            let len = scan_slot(io, &layout, slot, &mut buf)?;
            if len == 0 {
                outcome.gaps.insert(slot);
            } else {
                visit(slot, &buf[payload_window(len)]);
            }
        }
        return Ok(outcome);
    }

    let mut gap = 0u64;
    let mut end = tail;
    'scan: loop {
        while gap < end {
            let len = scan_slot(io, &layout, gap, &mut buf)?;
            if len == 0 {
                break;
            }
            visit(gap, &buf[payload_window(len)]);
            gap += 1;
        }
        if gap >= end {
            break;
        }
        loop {
            if end <= gap + 1 {
                // Nothing live above the gap: it becomes the tail.
                end = gap;
                break 'scan;
            }
            end -= 1;
            let len = scan_slot(io, &layout, end, &mut buf)?;
            if len != 0 {
                trace!(from = end, to = gap, len, "bucket.compact.move");
                io.write_at(layout.offset(gap), &buf)?;
                visit(gap, &buf[payload_window(len)]);
                outcome.moved += 1;
                gap += 1;
                break;
            }
        }
    }

    if end != tail {
        io.truncate(layout.offset(end))?;
        debug!(
            slot_size = layout.slot_size(),
            old_tail = tail,
            new_tail = end,
            moved = outcome.moved,
            "bucket.compact.truncated"
        );
    }
    outcome.tail = end;
    Ok(outcome)
}
