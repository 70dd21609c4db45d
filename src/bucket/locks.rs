#![forbid(unsafe_code)]

//! The two lock domains of a bucket.
//!
//! `slots` guards the free list and the tail. `file` guards the file handle
//! and the closed flag; reads and writes take it shared, only closing the
//! handle takes it exclusively. Whenever both are needed, `slots` is taken
//! first. The only way to reach the file guard while holding `slots` is
//! through [`SlotsGuard`], so that order cannot be inverted.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use crate::primitives::gaps::Gaps;
use crate::types::{BagError, Result};

/// Free-list state of a bucket.
#[derive(Debug, Default)]
pub(crate) struct SlotState {
    /// Free slots below `tail`.
    pub(crate) gaps: Gaps,
    /// First slot never handed out.
    pub(crate) tail: u64,
    /// Slots handed out by `allocate` whose first write has not finished.
    pub(crate) pending: Gaps,
}

impl SlotState {
    /// Lowest free slot, or a fresh one at the tail. The slot stays pending
    /// until [`SlotState::finish`] is called for it.
    pub(crate) fn allocate(&mut self) -> u64 {
        let slot = match self.gaps.take_lowest() {
            Some(slot) => slot,
            None => {
                self.tail += 1;
                self.tail - 1
            }
        };
        self.pending.insert(slot);
        slot
    }

    /// Ends the first write to `slot`, successful or not.
    pub(crate) fn finish(&mut self, slot: u64) {
        self.pending.remove(slot);
    }

    /// Drops trailing free slots, returning true if the tail moved.
    pub(crate) fn trim_tail(&mut self) -> bool {
        let before = self.tail;
        while self.tail > 0 && self.gaps.peek_last() == Some(self.tail - 1) {
            self.gaps.pop_last();
            self.tail -= 1;
        }
        self.tail != before
    }
}

/// File handle slot; `None` once the bucket is closed.
pub(crate) struct FileState<F> {
    io: Option<F>,
}

impl<F> FileState<F> {
    pub(crate) fn io(&self) -> Result<&F> {
        self.io.as_ref().ok_or(BagError::Closed)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.io.is_none()
    }

    pub(crate) fn take(&mut self) -> Option<F> {
        self.io.take()
    }
}

pub(crate) struct BucketLocks<F> {
    slots: Mutex<SlotState>,
    file: RwLock<FileState<F>>,
}

impl<F> BucketLocks<F> {
    pub(crate) fn new(io: F, state: SlotState) -> Self {
        Self {
            slots: Mutex::new(state),
            file: RwLock::new(FileState { io: Some(io) }),
        }
    }

    /// Takes the free-list lock. The file lock is reachable from the guard.
    pub(crate) fn slots(&self) -> SlotsGuard<'_, F> {
        SlotsGuard {
            state: self.slots.lock(),
            file: &self.file,
        }
    }

    /// Takes the file lock shared, for operations that never touch the free list.
    pub(crate) fn file(&self) -> RwLockReadGuard<'_, FileState<F>> {
        self.file.read()
    }
}

/// Held free-list lock, with ordered access to the file lock.
pub(crate) struct SlotsGuard<'a, F> {
    state: MutexGuard<'a, SlotState>,
    file: &'a RwLock<FileState<F>>,
}

impl<F> SlotsGuard<'_, F> {
    pub(crate) fn state(&self) -> &SlotState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut SlotState {
        &mut self.state
    }

    /// Runs `f` with the file lock held shared.
    pub(crate) fn with_file<R>(
        &mut self,
        f: impl FnOnce(&mut SlotState, &FileState<F>) -> R,
    ) -> R {
        let file = self.file.read();
        f(&mut self.state, &file)
    }

    /// Runs `f` with the file lock held exclusively.
    pub(crate) fn with_file_exclusive<R>(
        &mut self,
        f: impl FnOnce(&mut SlotState, &mut FileState<F>) -> R,
    ) -> R {
        let mut file = self.file.write();
        f(&mut self.state, &mut file)
    }
}
