#![forbid(unsafe_code)]

//! Fixed-slot buckets.
//!
//! A bucket stores variable-length records in a single file split into
//! equal slots. Deletion only updates the in-memory free list; free slots are
//! written back as zero headers on close and rediscovered by the scan that
//! runs on every open, which also compacts the file.

mod compact;
mod locks;
mod metrics;
mod options;

use std::fs;
use std::io::IoSlice;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::primitives::codec::{
    decode_header, encode_header, payload_window, SlotLayout, ZERO_HEADER,
};
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::{BagError, Result, ITEM_HEADER_SIZE};

use self::locks::{BucketLocks, SlotState};
pub use self::metrics::{BucketMetrics, BucketMetricsSnapshot};
pub use self::options::{BucketOptions, DEFAULT_SLOT_SIZE};

/// A collection of similarly sized records, one per slot.
///
/// Slot handles returned by [`Bucket::put`] stay valid until the record is
/// deleted. All methods take `&self`; a bucket can be shared between threads
/// behind an `Arc`.
pub struct Bucket<F: FileIo = StdFileIo> {
    id: String,
    path: Option<PathBuf>,
    layout: SlotLayout,
    readonly: bool,
    sync_on_close: bool,
    locks: BucketLocks<F>,
    metrics: BucketMetrics,
}

impl Bucket<StdFileIo> {
    /// Name of the file backing a bucket with the given slot size.
    pub fn file_name(slot_size: u32) -> String {
        format!("bkt_{slot_size:08}.bag")
    }

    /// Opens (or creates) the bucket for `options.slot_size` inside `dir`.
    pub fn open(dir: impl AsRef<Path>, options: BucketOptions) -> Result<Self> {
        Self::open_with(dir, options, |_, _| {})
    }

    /// Opens the bucket and reports every live record to `visitor`.
    ///
    /// The payload slice is reused between calls and must be copied if it is
    /// needed after the callback returns. Slot numbers reported here are the
    /// ones valid after open, which may differ from before since open
    /// compacts the file.
    pub fn open_with(
        dir: impl AsRef<Path>,
        options: BucketOptions,
        mut visitor: impl FnMut(u64, &[u8]),
    ) -> Result<Self> {
        let layout = options.validate()?;
        let dir = dir.as_ref();
        if !fs::metadata(dir)?.is_dir() {
            return Err(BagError::NotADirectory(dir.to_path_buf()));
        }
        let id = Self::file_name(layout.slot_size());
        let path = dir.join(&id);
        let io = if options.readonly {
            StdFileIo::open_readonly(&path)?
        } else {
            StdFileIo::open(&path)?
        };
        Self::open_inner(io, id, Some(path), options, &mut visitor)
    }
}

impl<F: FileIo> Bucket<F> {
    /// Opens a bucket over an arbitrary file implementation.
    pub fn from_io(
        io: F,
        options: BucketOptions,
        mut visitor: impl FnMut(u64, &[u8]),
    ) -> Result<Self> {
        let layout = options.validate()?;
        let id = Bucket::<StdFileIo>::file_name(layout.slot_size());
        Self::open_inner(io, id, None, options, &mut visitor)
    }

    fn open_inner(
        io: F,
        id: String,
        path: Option<PathBuf>,
        options: BucketOptions,
        visit: &mut dyn FnMut(u64, &[u8]),
    ) -> Result<Self> {
        let layout = options.validate()?;
        let tail = layout.slots_for_len(io.len()?);
        let bucket = Self {
            id,
            path,
            layout,
            readonly: options.readonly,
            sync_on_close: options.sync_on_close,
            locks: BucketLocks::new(io, SlotState::default()),
            metrics: BucketMetrics::default(),
        };
        let outcome = bucket
            .locks
            .slots()
            .with_file(|state, file| -> Result<compact::ScanOutcome> {
                let outcome = compact::compact(file.io()?, layout, tail, bucket.readonly, visit)?;
                state.tail = outcome.tail;
                state.gaps = outcome.gaps.clone();
                Ok(outcome)
            })?;
        if outcome.tail != tail {
            bucket.metrics.record_truncation();
        }
        bucket.metrics.record_moved(outcome.moved);
        info!(
            id = %bucket.id,
            slot_size = layout.slot_size(),
            tail = outcome.tail,
            gaps = outcome.gaps.len(),
            moved = outcome.moved,
            readonly = bucket.readonly,
            "bucket.open"
        );
        Ok(bucket)
    }

    /// Stores `data` in a free slot and returns the slot.
    ///
    /// The lowest free slot is reused before the file grows. The write is
    /// complete when this returns, so the caller may reuse `data`. If the
    /// write fails the slot goes back on the free list, and the file shrinks
    /// if that frees its end.
    pub fn put(&self, data: &[u8]) -> Result<u64> {
        if self.readonly {
            return Err(BagError::Readonly);
        }
        self.layout.check_payload(data.len())?;
        let slot = self
            .locks
            .slots()
            .with_file(|state, file| -> Result<u64> {
                file.io()?;
                Ok(state.allocate())
            })?;
        let written = self.write_record(slot, data);
        let layout = self.layout;
        let mut guard = self.locks.slots();
        guard.with_file(|state, file| {
            state.finish(slot);
            // A closed bucket has already dropped its free list.
            let (Err(_), Ok(io)) = (&written, file.io()) else {
                return;
            };
            match Self::free_slot(layout, state, io, slot) {
                Ok(Some(_)) => self.metrics.record_truncation(),
                Ok(None) => {}
                Err(err) => {
                    warn!(id = %self.id, slot, error = %err, "bucket.put.release_failed")
                }
            }
        });
        drop(guard);
        written?;
        self.metrics.record_put(data.len());
        Ok(slot)
    }

    /// Overwrites the record at `slot` in place.
    ///
    /// Cheaper than delete followed by put since the free list is not
    /// involved. `slot` is not checked against the tail: it must be a slot
    /// previously returned by [`Bucket::put`] and not deleted since.
    pub fn update(&self, data: &[u8], slot: u64) -> Result<()> {
        if self.readonly {
            return Err(BagError::Readonly);
        }
        self.layout.check_payload(data.len())?;
        self.write_record(slot, data)?;
        self.metrics.record_update(data.len());
        Ok(())
    }

    /// Returns the record at `slot`.
    ///
    /// The result for a deleted slot is undefined: it may be the deleted
    /// record or one written into the slot since.
    pub fn get(&self, slot: u64) -> Result<Vec<u8>> {
        let data = self.read_record(slot).map_err(|err| match err {
            BagError::Closed => BagError::Closed,
            other => BagError::BadRead {
                slot,
                source: Box::new(other),
            },
        })?;
        self.metrics.record_get(data.len());
        Ok(data)
    }

    /// Marks `slot` free.
    ///
    /// The file is only touched when the freed slots form a run at the end of
    /// the file, which is then truncated away. Otherwise the stale header
    /// stays on disk until the slot is reused or the bucket is closed.
    pub fn delete(&self, slot: u64) -> Result<()> {
        if self.readonly {
            return Err(BagError::Readonly);
        }
        let layout = self.layout;
        let mut guard = self.locks.slots();
        let trimmed = guard.with_file(|state, file| -> Result<Option<(u64, u64)>> {
            if slot >= state.tail {
                return Err(BagError::BadIndex {
                    slot,
                    tail: state.tail,
                });
            }
            Self::free_slot(layout, state, file.io()?, slot)
        })?;
        if let Some((old_tail, new_tail)) = trimmed {
            self.metrics.record_truncation();
            debug!(id = %self.id, old_tail, new_tail, "bucket.delete.trim");
        }
        self.metrics.record_delete();
        Ok(())
    }

    /// Visits every live record in ascending slot order.
    ///
    /// Slots on the free list are skipped without reading them, as are slots
    /// a concurrent put has claimed but not yet written. A slot that reads
    /// back with a zero header although it is not on the free list is added
    /// to it once the scan completes. The payload slice is reused between
    /// calls.
    pub fn iterate(&self, mut visit: impl FnMut(u64, &[u8])) -> Result<()> {
        let layout = self.layout;
        let mut guard = self.locks.slots();
        let healed = guard.with_file(|state, file| -> Result<u64> {
            let io = file.io()?;
            let mut buf = vec![0u8; layout.slot_size() as usize];
            let mut healed = Vec::new();
            let mut free = state.gaps.as_slice().iter().copied().peekable();
            for slot in 0..state.tail {
                if free.next_if_eq(&slot).is_some() || state.pending.contains(slot) {
                    continue;
                }
                let len = compact::read_slot(io, &layout, slot, &mut buf)?;
                if len == 0 {
                    healed.push(slot);
                    continue;
                }
                visit(slot, &buf[payload_window(len)]);
            }
            state.gaps.extend_sorted(&healed);
            Ok(healed.len() as u64)
        })?;
        if healed > 0 {
            self.metrics.record_healed(healed);
            debug!(id = %self.id, healed, "bucket.iterate.healed");
        }
        Ok(())
    }

    /// Persists the free list as zero headers and closes the file.
    ///
    /// Every free slot is flushed even if some writes fail; the last failure
    /// is returned. Closing a closed bucket does nothing.
    pub fn close(&self) -> Result<()> {
        let layout = self.layout;
        let mut guard = self.locks.slots();
        guard.with_file_exclusive(|state, file| -> Result<()> {
            let Some(io) = file.take() else {
                return Ok(());
            };
            let mut result: Result<()> = Ok(());
            if !self.readonly {
                for &gap in state.gaps.as_slice() {
                    if let Err(err) = io.write_at(layout.offset(gap), &ZERO_HEADER) {
                        warn!(id = %self.id, slot = gap, error = %err, "bucket.close.flush_failed");
                        result = Err(err);
                    }
                }
                if self.sync_on_close {
                    if let Err(err) = io.sync_all() {
                        warn!(id = %self.id, error = %err, "bucket.close.sync_failed");
                        result = Err(err);
                    }
                }
            }
            info!(
                id = %self.id,
                tail = state.tail,
                gaps = state.gaps.len(),
                "bucket.close"
            );
            state.gaps.clear();
            drop(io);
            result
        })
    }

    /// Slot size in bytes.
    pub fn slot_size(&self) -> u32 {
        self.layout.slot_size()
    }

    /// First slot never handed out; the file spans `tail * slot_size` bytes.
    pub fn tail(&self) -> u64 {
        self.locks.slots().state().tail
    }

    /// Number of free slots below the tail.
    pub fn gap_count(&self) -> usize {
        self.locks.slots().state().gaps.len()
    }

    /// Whether the bucket was opened read-only.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Whether [`Bucket::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.locks.file().is_closed()
    }

    /// File name of the bucket, derived from its slot size.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full path of the backing file, if it lives on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the operation counters.
    pub fn metrics(&self) -> BucketMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn write_record(&self, slot: u64, data: &[u8]) -> Result<()> {
        let file = self.locks.file();
        let io = file.io()?;
        let hdr = encode_header(data.len() as u32);
        io.writev_at(
            self.layout.offset(slot),
            &[IoSlice::new(&hdr), IoSlice::new(data)],
        )
    }

    fn read_record(&self, slot: u64) -> Result<Vec<u8>> {
        let file = self.locks.file();
        let io = file.io()?;
        let offset = self.layout.offset(slot);
        let mut hdr = [0u8; ITEM_HEADER_SIZE];
        io.read_at(offset, &mut hdr)?;
        let len = decode_header(&hdr);
        self.layout.check_stored_len(slot, len)?;
        let mut data = vec![0u8; len as usize];
        io.read_at(offset + ITEM_HEADER_SIZE as u64, &mut data)?;
        Ok(data)
    }

    /// Puts `slot` on the free list and cuts a free run at the end of the
    /// file away. Returns the old and new tail if the file shrank.
    fn free_slot(
        layout: SlotLayout,
        state: &mut SlotState,
        io: &F,
        slot: u64,
    ) -> Result<Option<(u64, u64)>> {
        state.gaps.insert(slot);
        let old_tail = state.tail;
        if !state.trim_tail() {
            return Ok(None);
        }
        if let Err(err) = io.truncate(layout.offset(state.tail)) {
            // Keep the trimmed slots as gaps so close still zeroes them.
            for free in state.tail..old_tail {
                state.gaps.insert(free);
            }
            state.tail = old_tail;
            return Err(err);
        }
        Ok(Some((old_tail, state.tail)))
    }
}

impl<F: FileIo> Drop for Bucket<F> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(id = %self.id, error = %err, "bucket.drop.close_failed");
        }
    }
}
