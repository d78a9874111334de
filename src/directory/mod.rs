//! Named, growable byte stores over interchangeable backends.
//!
//! A [`Directory`] hands out [`DataStore`]s by name. Every store is a sequence of
//! fixed-size segments; both the heap-resident [`RamDirectory`] and the
//! memory-mapped [`MmapDirectory`] persist a store as one file holding a
//! [`StoreHeader`] followed by the segments in order, so a store flushed by one
//! backend can be reopened by the other.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::primitives::bytes::le;
use crate::types::{Result, StoreError};

mod header;
mod mmap;
mod ram;
mod segmented;

pub use header::{StoreHeader, STORE_FORMAT_VERSION, STORE_HEADER_LEN, STORE_MAGIC};
pub use mmap::{MmapDataStore, MmapDirectory};
pub use ram::{RamDataStore, RamDirectory};
pub use segmented::{SegmentBackend, SegmentedStore};

/// Smallest accepted segment size in bytes.
pub const MIN_SEGMENT_SIZE: u32 = 1 << 7;
/// Segment size used when none is configured.
pub const DEFAULT_SEGMENT_SIZE: u32 = 1 << 20;

/// Backend family a store or directory belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Heap segments, never written to disk.
    Ram,
    /// Heap segments written to a file on flush.
    RamStore,
    /// Segments mapped from a single growable file.
    Mmap,
}

impl StoreKind {
    /// Whether stores of this kind survive `close`.
    pub fn is_persistent(self) -> bool {
        !matches!(self, StoreKind::Ram)
    }
}

/// Checks that `segment_size` is a power of two no smaller than [`MIN_SEGMENT_SIZE`].
pub fn validate_segment_size(segment_size: u32) -> Result<u32> {
    if segment_size < MIN_SEGMENT_SIZE || !segment_size.is_power_of_two() {
        return Err(StoreError::Config(format!(
            "segment size {segment_size} must be a power of two >= {MIN_SEGMENT_SIZE}"
        )));
    }
    Ok(segment_size)
}

/// A growable byte-addressable region made of fixed-size segments.
///
/// Offsets are linear; implementations translate them to a segment index and an
/// offset within that segment. Capacity only grows, in whole segments, and growth
/// never moves bytes already written.
pub trait DataStore: Send + Sync {
    /// Name the store was created under.
    fn name(&self) -> &str;
    /// Backend family of this store.
    fn kind(&self) -> StoreKind;
    /// Configured segment size in bytes.
    fn segment_size(&self) -> u32;
    /// Number of allocated segments.
    fn segments(&self) -> usize;
    /// Allocated bytes, `segments() * segment_size()`.
    fn capacity(&self) -> u64 {
        self.segments() as u64 * self.segment_size() as u64
    }
    /// Initialises an empty store with room for at least `bytes` (and one segment).
    fn create(&mut self, bytes: u64) -> Result<()>;
    /// Loads a previously flushed store. Returns `false` when nothing was persisted.
    fn load_existing(&mut self) -> Result<bool>;
    /// Grows to the smallest segment multiple holding `bytes`. Returns whether it grew.
    fn ensure_capacity(&mut self, bytes: u64) -> Result<bool>;
    /// Copies `dst.len()` bytes starting at `offset`.
    fn get_bytes(&self, offset: u64, dst: &mut [u8]) -> Result<()>;
    /// Writes `src` starting at `offset`.
    fn set_bytes(&mut self, offset: u64, src: &[u8]) -> Result<()>;
    /// Persists header and body, if the backend persists at all.
    fn flush(&mut self) -> Result<()>;
    /// Releases segments and file handles. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
    /// Whether `close` has run.
    fn is_closed(&self) -> bool;

    /// Reads a little-endian i32.
    fn get_int(&self, offset: u64) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.get_bytes(offset, &mut buf)?;
        Ok(le::get_i32(&buf))
    }

    /// Writes a little-endian i32.
    fn set_int(&mut self, offset: u64, value: i32) -> Result<()> {
        self.set_bytes(offset, &value.to_le_bytes())
    }

    /// Reads a little-endian u32.
    fn get_u32(&self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.get_bytes(offset, &mut buf)?;
        Ok(le::get_u32(&buf))
    }

    /// Writes a little-endian u32.
    fn set_u32(&mut self, offset: u64, value: u32) -> Result<()> {
        self.set_bytes(offset, &value.to_le_bytes())
    }

    /// Reads a little-endian u64.
    fn get_u64(&self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.get_bytes(offset, &mut buf)?;
        Ok(le::get_u64(&buf))
    }

    /// Writes a little-endian u64.
    fn set_u64(&mut self, offset: u64, value: u64) -> Result<()> {
        self.set_bytes(offset, &value.to_le_bytes())
    }

    /// Reads a little-endian f64.
    fn get_f64(&self, offset: u64) -> Result<f64> {
        Ok(f64::from_bits(self.get_u64(offset)?))
    }

    /// Writes a little-endian f64.
    fn set_f64(&mut self, offset: u64, value: f64) -> Result<()> {
        self.set_u64(offset, value.to_bits())
    }
}

/// Source of named data stores.
pub trait Directory: Send + Sync {
    /// Backend family of the stores handed out.
    fn kind(&self) -> StoreKind;
    /// Folder holding persisted stores, if any.
    fn location(&self) -> Option<&Path>;
    /// Returns a fresh, not yet created store. Persisted content under the same
    /// name is replaced once the store is created and flushed.
    fn create(&self, name: &str, segment_size: u32) -> Result<Box<dyn DataStore>>;
    /// Opens and loads the persisted store `name`, or `None` when there is none.
    fn find(&self, name: &str, segment_size: u32) -> Result<Option<Box<dyn DataStore>>>;
    /// Whether a persisted store named `name` exists.
    fn exists(&self, name: &str) -> bool;
    /// Deletes the persisted store `name`.
    fn remove(&self, name: &str) -> Result<()>;
    /// Names of all persisted stores, sorted.
    fn store_names(&self) -> Result<Vec<String>>;
}

/// Names currently handed out by one directory.
#[derive(Clone, Default)]
pub(crate) struct StoreRegistry {
    open: Arc<Mutex<FxHashSet<String>>>,
}

impl StoreRegistry {
    /// Claims `name` for one store handle until the returned lease drops.
    pub(crate) fn acquire(&self, name: &str) -> Result<StoreLease> {
        let mut open = self.open.lock();
        if !open.insert(name.to_owned()) {
            return Err(StoreError::IllegalState("store is already open"));
        }
        Ok(StoreLease {
            name: name.to_owned(),
            open: Arc::clone(&self.open),
        })
    }

    pub(crate) fn is_open(&self, name: &str) -> bool {
        self.open.lock().contains(name)
    }
}

/// Exclusive claim on a store name, released on drop.
pub(crate) struct StoreLease {
    name: String,
    open: Arc<Mutex<FxHashSet<String>>>,
}

impl Drop for StoreLease {
    fn drop(&mut self) {
        self.open.lock().remove(&self.name);
    }
}

pub(crate) fn list_store_files(location: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !location.exists() {
        return Ok(names);
    }
    for entry in std::fs::read_dir(location)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_owned());
        }
    }
    names.sort();
    Ok(names)
}

pub(crate) fn validate_store_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(StoreError::Invalid("store name must be a plain file name"));
    }
    Ok(())
}
