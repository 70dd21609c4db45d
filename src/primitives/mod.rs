//! Low-level primitives for building buckets.
//!
//! Includes the slot header codec, positional file I/O and the sorted
//! free-slot set.

/// Slot header encoding and slot geometry.
pub mod codec;

/// Sorted, duplicate-free set of free slots.
pub mod gaps;

/// I/O abstractions and utilities.
///
/// Interfaces for positional reads/writes and file operations.
pub mod io;
