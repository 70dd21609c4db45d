//! Fixed-slot record storage.
//!
//! A [`Bucket`] keeps byte records of up to `slot_size - 4` bytes in a single
//! file of equal-size slots and hands out stable slot numbers as handles.
//! Free slots are tracked in memory and reused lowest first; the file is
//! truncated when the end of it becomes free, and compacted every time the
//! bucket is opened.
//!
//! ```no_run
//! use bagdb::{Bucket, BucketOptions};
//!
//! # fn main() -> bagdb::Result<()> {
//! let bucket = Bucket::open("/var/lib/bags", BucketOptions::new(256))?;
//! let slot = bucket.put(b"hello")?;
//! assert_eq!(bucket.get(slot)?, b"hello");
//! bucket.delete(slot)?;
//! bucket.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bucket;
pub mod primitives;
pub mod types;

pub use bucket::{Bucket, BucketMetricsSnapshot, BucketOptions};
pub use primitives::io::{FileIo, StdFileIo};
pub use types::{BagError, Result, ITEM_HEADER_SIZE, MAX_SLOT_SIZE, MIN_SLOT_SIZE};
