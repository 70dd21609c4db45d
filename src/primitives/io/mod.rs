#![forbid(unsafe_code)]

use std::{
    fs::File,
    io::{self, IoSlice},
    path::Path,
    sync::Arc,
};

use tracing::trace;

use crate::types::{BagError, Result};

/// Trait for performing positioned file I/O operations.
///
/// All methods take `&self`: positional reads and writes to a shared handle
/// need no engine-level exclusion.
pub trait FileIo: Send + Sync + 'static {
    /// Reads exactly `dst.len()` bytes at the specified offset.
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()>;
    /// Reads up to `dst.len()` bytes at the specified offset, stopping early
    /// at end of file. Returns the number of bytes read.
    fn read_at_most(&self, off: u64, dst: &mut [u8]) -> Result<usize>;
    /// Writes bytes to the file at the specified offset from the buffer.
    fn write_at(&self, off: u64, src: &[u8]) -> Result<()>;
    /// Writes multiple buffers back to back starting at the specified offset.
    fn writev_at(&self, mut off: u64, bufs: &[IoSlice<'_>]) -> Result<()> {
        for slice in bufs {
            if slice.is_empty() {
                continue;
            }
            self.write_at(off, slice)?;
            off = off.checked_add(slice.len() as u64).ok_or_else(|| {
                BagError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "writev offset overflow",
                ))
            })?;
        }
        Ok(())
    }
    /// Synchronizes all file data and metadata to disk.
    fn sync_all(&self) -> Result<()>;
    /// Returns the current length of the file in bytes.
    fn len(&self) -> Result<u64>;
    /// Truncates or extends the file to the specified length.
    fn truncate(&self, len: u64) -> Result<()>;
}

#[cfg(unix)]
/// Unix-specific file I/O operations using POSIX APIs.
pub mod stdio_unix {
    use std::{
        fs::File,
        io::{self, ErrorKind},
        os::unix::fs::FileExt,
    };

    use tracing::trace;

    /// Reads until `dst` is full or EOF, using pread semantics.
    pub fn read_at_most(file: &File, mut off: u64, dst: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            match file.read_at(&mut dst[filled..], off) {
                Ok(0) => break,
                Ok(read) => {
                    filled += read;
                    off += read as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }

    /// Writes all bytes at offset using pwrite semantics.
    pub fn write_all(file: &File, mut off: u64, mut src: &[u8]) -> io::Result<()> {
        while !src.is_empty() {
            let written = file.write_at(src, off)?;
            if written == 0 {
                trace!(off, remaining = src.len(), "io.write_all.zero");
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "write_at wrote zero bytes",
                ));
            }
            src = &src[written..];
            off += written as u64;
        }
        Ok(())
    }
}

#[cfg(windows)]
/// Windows-specific file I/O operations using Windows APIs.
pub mod stdio_win {
    use std::{
        fs::File,
        io::{self, ErrorKind},
        os::windows::fs::FileExt,
    };

    /// Reads until `dst` is full or EOF, using seek_read semantics.
    pub fn read_at_most(file: &File, mut off: u64, dst: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            match file.seek_read(&mut dst[filled..], off) {
                Ok(0) => break,
                Ok(read) => {
                    filled += read;
                    off += read as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }

    /// Writes all bytes at offset using seek_write semantics.
    pub fn write_all(file: &File, mut off: u64, mut src: &[u8]) -> io::Result<()> {
        while !src.is_empty() {
            let written = file.seek_write(src, off)?;
            if written == 0 {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "seek_write wrote zero bytes",
                ));
            }
            src = &src[written..];
            off += written as u64;
        }
        Ok(())
    }
}

/// Standard file I/O implementation using `Arc<File>`.
#[derive(Clone)]
pub struct StdFileIo {
    inner: Arc<File>,
}

impl StdFileIo {
    /// Creates a new StdFileIo from an existing File handle.
    pub fn new(file: File) -> Self {
        Self {
            inner: Arc::new(file),
        }
    }

    /// Opens or creates a file for read-write access.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(BagError::from)?;
        Ok(Self::new(file))
    }

    /// Opens an existing file for reading only. Never creates the file.
    pub fn open_readonly(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::options()
            .read(true)
            .open(path)
            .map_err(BagError::from)?;
        Ok(Self::new(file))
    }

    fn file(&self) -> &File {
        &self.inner
    }

    #[cfg(unix)]
    fn read_some(&self, off: u64, dst: &mut [u8]) -> io::Result<usize> {
        stdio_unix::read_at_most(self.file(), off, dst)
    }

    #[cfg(windows)]
    fn read_some(&self, off: u64, dst: &mut [u8]) -> io::Result<usize> {
        stdio_win::read_at_most(self.file(), off, dst)
    }

    #[cfg(unix)]
    fn write_all(&self, off: u64, src: &[u8]) -> io::Result<()> {
        stdio_unix::write_all(self.file(), off, src)
    }

    #[cfg(windows)]
    fn write_all(&self, off: u64, src: &[u8]) -> io::Result<()> {
        stdio_win::write_all(self.file(), off, src)
    }

    #[cfg(not(any(unix, windows)))]
    fn read_some(&self, _off: u64, _dst: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "StdFileIo unsupported on this platform",
        ))
    }

    #[cfg(not(any(unix, windows)))]
    fn write_all(&self, _off: u64, _src: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "StdFileIo unsupported on this platform",
        ))
    }
}

impl FileIo for StdFileIo {
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        let read = self.read_some(off, dst)?;
        if read < dst.len() {
            return Err(BagError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read_at reached EOF",
            )));
        }
        Ok(())
    }

    fn read_at_most(&self, off: u64, dst: &mut [u8]) -> Result<usize> {
        self.read_some(off, dst).map_err(BagError::from)
    }

    fn write_at(&self, off: u64, src: &[u8]) -> Result<()> {
        self.write_all(off, src).map_err(BagError::from)
    }

    fn sync_all(&self) -> Result<()> {
        trace!("io.sync_all.start");
        self.file().sync_all().map_err(BagError::from)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file().metadata().map_err(BagError::from)?.len())
    }

    fn truncate(&self, len: u64) -> Result<()> {
        self.file().set_len(len).map_err(BagError::from)
    }
}
