use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::header::{StoreHeader, STORE_HEADER_LEN};
use super::segmented::{SegmentBackend, SegmentedStore};
use super::{
    list_store_files, validate_store_name, DataStore, Directory, StoreKind, StoreRegistry,
};
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::{Result, StoreError};

/// Heap-resident segments, optionally written to `<location>/<name>` on flush.
pub struct RamSegments {
    segments: Vec<Box<[u8]>>,
    file: Option<PathBuf>,
    pending: Option<StdFileIo>,
}

impl RamSegments {
    fn new(file: Option<PathBuf>) -> Self {
        Self {
            segments: Vec::new(),
            file,
            pending: None,
        }
    }
}

impl SegmentBackend for RamSegments {
    fn kind(&self) -> StoreKind {
        if self.file.is_some() {
            StoreKind::RamStore
        } else {
            StoreKind::Ram
        }
    }

    fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn segment(&self, idx: usize) -> &[u8] {
        &self.segments[idx]
    }

    fn segment_mut(&mut self, idx: usize) -> &mut [u8] {
        &mut self.segments[idx]
    }

    fn open_new(&mut self) -> Result<()> {
        self.segments.clear();
        Ok(())
    }

    fn grow(&mut self, count: usize, segment_size: usize) -> Result<()> {
        let additional = count.saturating_sub(self.segments.len());
        self.segments.try_reserve(additional).map_err(|err| {
            StoreError::Capacity(format!("cannot reserve {additional} segments: {err}"))
        })?;
        while self.segments.len() < count {
            self.segments.push(vec![0u8; segment_size].into_boxed_slice());
        }
        Ok(())
    }

    fn read_header(&mut self) -> Result<Option<[u8; STORE_HEADER_LEN]>> {
        let Some(path) = self.file.as_ref() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let io = StdFileIo::open_existing(path)?;
        if io.len()? < STORE_HEADER_LEN as u64 {
            return Err(StoreError::Corruption("store header truncated"));
        }
        let mut raw = [0u8; STORE_HEADER_LEN];
        io.read_at(0, &mut raw)?;
        self.pending = Some(io);
        Ok(Some(raw))
    }

    fn load_body(&mut self, header: &StoreHeader) -> Result<()> {
        let io = self
            .pending
            .take()
            .ok_or(StoreError::IllegalState("store body read without header"))?;
        let segment_size = header.segment_size as usize;
        if io.len()? < STORE_HEADER_LEN as u64 + header.length {
            return Err(StoreError::Corruption("store body truncated"));
        }
        self.segments.clear();
        for idx in 0..header.segments() {
            let mut segment = vec![0u8; segment_size].into_boxed_slice();
            let off = STORE_HEADER_LEN as u64 + (idx * segment_size) as u64;
            io.read_at(off, &mut segment)?;
            self.segments.push(segment);
        }
        Ok(())
    }

    fn persist(&mut self, header: &[u8; STORE_HEADER_LEN]) -> Result<()> {
        let Some(path) = self.file.as_ref() else {
            return Ok(());
        };
        let io = StdFileIo::create(path)?;
        let body: u64 = self.segments.iter().map(|s| s.len() as u64).sum();
        io.truncate(STORE_HEADER_LEN as u64 + body)?;
        io.write_at(0, header)?;
        let mut off = STORE_HEADER_LEN as u64;
        for segment in &self.segments {
            io.write_at(off, segment)?;
            off += segment.len() as u64;
        }
        io.sync_all()
    }

    fn release(&mut self) {
        self.segments = Vec::new();
        self.pending = None;
    }
}

/// Heap-resident store handed out by [`RamDirectory`].
pub type RamDataStore = SegmentedStore<RamSegments>;

/// Directory keeping every store on the heap.
///
/// With a location the stores are written to files on flush and can be loaded
/// again later, by this directory or by an [`super::MmapDirectory`] on the same
/// folder. Without one, content is lost on close.
pub struct RamDirectory {
    location: Option<PathBuf>,
    registry: StoreRegistry,
}

impl RamDirectory {
    /// Purely in-memory directory.
    pub fn new() -> Self {
        Self {
            location: None,
            registry: StoreRegistry::default(),
        }
    }

    /// Directory persisting its stores below `location` on flush.
    pub fn persistent(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        fs::create_dir_all(&location)?;
        debug!(location = %location.display(), "directory.ram.open");
        Ok(Self {
            location: Some(location),
            registry: StoreRegistry::default(),
        })
    }

    fn store_path(&self, name: &str) -> Option<PathBuf> {
        self.location.as_ref().map(|loc| loc.join(name))
    }

    fn handle(&self, name: &str, segment_size: u32) -> Result<RamDataStore> {
        validate_store_name(name)?;
        let lease = self.registry.acquire(name)?;
        SegmentedStore::new(
            name,
            segment_size,
            RamSegments::new(self.store_path(name)),
            lease,
        )
    }
}

impl Default for RamDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory for RamDirectory {
    fn kind(&self) -> StoreKind {
        if self.location.is_some() {
            StoreKind::RamStore
        } else {
            StoreKind::Ram
        }
    }

    fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn create(&self, name: &str, segment_size: u32) -> Result<Box<dyn DataStore>> {
        Ok(Box::new(self.handle(name, segment_size)?))
    }

    fn find(&self, name: &str, segment_size: u32) -> Result<Option<Box<dyn DataStore>>> {
        if !self.exists(name) {
            return Ok(None);
        }
        let mut store = self.handle(name, segment_size)?;
        if !store.load_existing()? {
            return Ok(None);
        }
        Ok(Some(Box::new(store)))
    }

    fn exists(&self, name: &str) -> bool {
        self.store_path(name).is_some_and(|path| path.is_file())
    }

    fn remove(&self, name: &str) -> Result<()> {
        validate_store_name(name)?;
        if self.registry.is_open(name) {
            return Err(StoreError::IllegalState("cannot remove an open store"));
        }
        match self.store_path(name) {
            Some(path) if path.is_file() => Ok(fs::remove_file(path)?),
            _ => Err(StoreError::NotFound(format!("store {name}"))),
        }
    }

    fn store_names(&self) -> Result<Vec<String>> {
        match self.location.as_ref() {
            Some(loc) => list_store_files(loc),
            None => Ok(Vec::new()),
        }
    }
}
