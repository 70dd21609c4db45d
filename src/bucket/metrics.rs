#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for bucket operations.
#[derive(Default)]
pub struct BucketMetrics {
    puts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    gets: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    truncations: AtomicU64,
    slots_moved: AtomicU64,
    gaps_healed: AtomicU64,
}

/// Snapshot of bucket metrics at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BucketMetricsSnapshot {
    /// Successful puts
    pub puts: u64,
    /// Successful updates
    pub updates: u64,
    /// Successful deletes
    pub deletes: u64,
    /// Successful gets
    pub gets: u64,
    /// Payload bytes written by puts and updates
    pub bytes_written: u64,
    /// Payload bytes returned by gets
    pub bytes_read: u64,
    /// File truncations, at open and on delete
    pub truncations: u64,
    /// Records relocated by compaction at open
    pub slots_moved: u64,
    /// Free slots found by iteration that were missing from the free list
    pub gaps_healed: u64,
}

impl BucketMetrics {
    pub(crate) fn record_put(&self, bytes: usize) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self, bytes: usize) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_get(&self, bytes: usize) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_truncation(&self) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_moved(&self, slots: u64) {
        self.slots_moved.fetch_add(slots, Ordering::Relaxed);
    }

    pub(crate) fn record_healed(&self, slots: u64) {
        self.gaps_healed.fetch_add(slots, Ordering::Relaxed);
    }

    /// Creates a snapshot of the current counters.
    pub fn snapshot(&self) -> BucketMetricsSnapshot {
        BucketMetricsSnapshot {
            puts: self.puts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            truncations: self.truncations.load(Ordering::Relaxed),
            slots_moved: self.slots_moved.load(Ordering::Relaxed),
            gaps_healed: self.gaps_healed.load(Ordering::Relaxed),
        }
    }
}
