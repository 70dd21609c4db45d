#![forbid(unsafe_code)]

//! Sorted set of free slot indices.
//!
//! Slots are handed out lowest first so that writes gravitate towards the
//! start of the file, which gives deletions near the end a chance to shrink
//! it.

/// Ascending, duplicate-free list of free slot indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Gaps {
    slots: Vec<u64>,
}

impl Gaps {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `slot`, keeping the order. Returns false if it was already present.
    pub fn insert(&mut self, slot: u64) -> bool {
        match self.slots.binary_search(&slot) {
            Ok(_) => false,
            Err(pos) => {
                self.slots.insert(pos, slot);
                true
            }
        }
    }

    /// Removes `slot` if present.
    pub fn remove(&mut self, slot: u64) -> bool {
        match self.slots.binary_search(&slot) {
            Ok(pos) => {
                self.slots.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Removes and returns the smallest free slot.
    pub fn take_lowest(&mut self) -> Option<u64> {
        if self.slots.is_empty() {
            None
        } else {
            Some(self.slots.remove(0))
        }
    }

    /// Largest free slot, if any.
    pub fn peek_last(&self) -> Option<u64> {
        self.slots.last().copied()
    }

    /// Removes and returns the largest free slot.
    pub fn pop_last(&mut self) -> Option<u64> {
        self.slots.pop()
    }

    /// Returns true if `slot` is in the set.
    pub fn contains(&self, slot: u64) -> bool {
        self.slots.binary_search(&slot).is_ok()
    }

    /// Number of free slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no slot is free.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Empties the set.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Free slots in ascending order.
    pub fn as_slice(&self) -> &[u64] {
        &self.slots
    }

    /// Merges already-sorted slots into the set.
    pub fn extend_sorted(&mut self, slots: &[u64]) {
        if slots.is_empty() {
            return;
        }
        let mut merged = Vec::with_capacity(self.slots.len() + slots.len());
        let (mut i, mut j) = (0, 0);
        while i < self.slots.len() || j < slots.len() {
            let slot = match (self.slots.get(i), slots.get(j)) {
                (Some(&x), Some(&y)) if x <= y => {
                    i += 1;
                    x
                }
                (_, Some(&y)) => {
                    j += 1;
                    y
                }
                (Some(&x), None) => {
                    i += 1;
                    x
                }
                (None, None) => break,
            };
            if merged.last() != Some(&slot) {
                merged.push(slot);
            }
        }
        self.slots = merged;
    }
}
