#![forbid(unsafe_code)]

use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

use crate::types::{Result, StoreError};

/// Positioned access to a store file: header at offset 0, segments after it.
pub trait FileIo: Send + Sync + 'static {
    /// Fills `dst` from `off`; reading past the end is an error.
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()>;
    /// Writes all of `src` at `off`, extending the file if needed.
    fn write_at(&self, off: u64, src: &[u8]) -> Result<()>;
    /// Flushes data and metadata to disk.
    fn sync_all(&self) -> Result<()>;
    /// Current file length.
    fn len(&self) -> Result<u64>;
    /// Whether the file is empty.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
    /// Sets the file length; new bytes read as zero.
    fn truncate(&self, len: u64) -> Result<()>;
}

#[cfg(unix)]
mod positioned {
    use std::{fs::File, io, os::unix::fs::FileExt};

    pub fn read_exact(file: &File, off: u64, dst: &mut [u8]) -> io::Result<()> {
        file.read_exact_at(dst, off)
    }

    pub fn write_all(file: &File, off: u64, src: &[u8]) -> io::Result<()> {
        file.write_all_at(src, off)
    }
}

#[cfg(windows)]
mod positioned {
    use std::{
        fs::File,
        io::{self, ErrorKind},
        os::windows::fs::FileExt,
    };

    pub fn read_exact(file: &File, mut off: u64, mut dst: &mut [u8]) -> io::Result<()> {
        while !dst.is_empty() {
            match file.seek_read(dst, off)? {
                0 => return Err(ErrorKind::UnexpectedEof.into()),
                n => {
                    dst = &mut dst[n..];
                    off += n as u64;
                }
            }
        }
        Ok(())
    }

    pub fn write_all(file: &File, mut off: u64, mut src: &[u8]) -> io::Result<()> {
        while !src.is_empty() {
            match file.seek_write(src, off)? {
                0 => return Err(ErrorKind::WriteZero.into()),
                n => {
                    src = &src[n..];
                    off += n as u64;
                }
            }
        }
        Ok(())
    }
}

/// Store file opened read-write, accessed only through positioned calls.
pub struct StdFileIo {
    inner: File,
}

impl StdFileIo {
    /// Wraps an already opened file.
    pub fn new(file: File) -> Self {
        Self { inner: file }
    }

    /// Creates the file, discarding any previous content.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(file))
    }

    /// Opens an existing file for read-write access.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
                _ => StoreError::Io(err),
            })?;
        Ok(Self::new(file))
    }

    /// Borrow of the underlying handle, used to establish mappings.
    pub fn file(&self) -> &File {
        &self.inner
    }
}

impl FileIo for StdFileIo {
    #[cfg(any(unix, windows))]
    fn read_at(&self, off: u64, dst: &mut [u8]) -> Result<()> {
        positioned::read_exact(self.file(), off, dst).map_err(StoreError::from)
    }

    #[cfg(any(unix, windows))]
    fn write_at(&self, off: u64, src: &[u8]) -> Result<()> {
        positioned::write_all(self.file(), off, src).map_err(StoreError::from)
    }

    #[cfg(not(any(unix, windows)))]
    fn read_at(&self, _off: u64, _dst: &mut [u8]) -> Result<()> {
        Err(StoreError::IllegalState("StdFileIo unsupported on this platform"))
    }

    #[cfg(not(any(unix, windows)))]
    fn write_at(&self, _off: u64, _src: &[u8]) -> Result<()> {
        Err(StoreError::IllegalState("StdFileIo unsupported on this platform"))
    }

    fn sync_all(&self) -> Result<()> {
        self.file().sync_all().map_err(StoreError::from)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file().metadata()?.len())
    }

    fn truncate(&self, len: u64) -> Result<()> {
        self.file().set_len(len).map_err(|err| {
            StoreError::Capacity(format!("cannot resize file to {len} bytes: {err}"))
        })
    }
}
