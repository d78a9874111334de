use std::fs;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::debug;

use super::header::{StoreHeader, STORE_HEADER_LEN};
use super::segmented::{SegmentBackend, SegmentedStore};
use super::{
    list_store_files, validate_store_name, DataStore, Directory, StoreKind, StoreRegistry,
};
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::{Result, StoreError};

/// Segments mapped from one file: the header at offset 0, segment `i` at
/// `STORE_HEADER_LEN + i * segment_size`.
pub struct MmapSegments {
    path: PathBuf,
    io: Option<StdFileIo>,
    maps: Vec<MmapMut>,
}

impl MmapSegments {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            io: None,
            maps: Vec::new(),
        }
    }

    fn io(&self) -> Result<&StdFileIo> {
        self.io
            .as_ref()
            .ok_or(StoreError::IllegalState("mapped store has no open file"))
    }

    fn map_segment(&self, idx: usize, segment_size: usize) -> Result<MmapMut> {
        let io = self.io()?;
        let offset = STORE_HEADER_LEN as u64 + (idx * segment_size) as u64;
        // SAFETY: the file is exclusively owned by this store (enforced by the
        // directory lease) and is only ever extended while mapped, never truncated.
        let map = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(segment_size)
                .map_mut(io.file())
        };
        map.map_err(|err| StoreError::Capacity(format!("cannot map segment {idx}: {err}")))
    }
}

impl SegmentBackend for MmapSegments {
    fn kind(&self) -> StoreKind {
        StoreKind::Mmap
    }

    fn segment_count(&self) -> usize {
        self.maps.len()
    }

    fn segment(&self, idx: usize) -> &[u8] {
        &self.maps[idx]
    }

    fn segment_mut(&mut self, idx: usize) -> &mut [u8] {
        &mut self.maps[idx]
    }

    fn open_new(&mut self) -> Result<()> {
        self.maps.clear();
        let io = StdFileIo::create(&self.path)?;
        io.truncate(STORE_HEADER_LEN as u64)?;
        self.io = Some(io);
        Ok(())
    }

    fn grow(&mut self, count: usize, segment_size: usize) -> Result<()> {
        if count <= self.maps.len() {
            return Ok(());
        }
        let len = STORE_HEADER_LEN as u64 + (count * segment_size) as u64;
        self.io()?.truncate(len)?;
        for idx in self.maps.len()..count {
            let map = self.map_segment(idx, segment_size)?;
            self.maps.push(map);
        }
        Ok(())
    }

    fn read_header(&mut self) -> Result<Option<[u8; STORE_HEADER_LEN]>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let io = StdFileIo::open_existing(&self.path)?;
        if io.len()? < STORE_HEADER_LEN as u64 {
            return Err(StoreError::Corruption("store header truncated"));
        }
        let mut raw = [0u8; STORE_HEADER_LEN];
        io.read_at(0, &mut raw)?;
        self.io = Some(io);
        Ok(Some(raw))
    }

    fn load_body(&mut self, header: &StoreHeader) -> Result<()> {
        if self.io()?.len()? < STORE_HEADER_LEN as u64 + header.length {
            return Err(StoreError::Corruption("store body truncated"));
        }
        self.maps.clear();
        for idx in 0..header.segments() {
            let map = self.map_segment(idx, header.segment_size as usize)?;
            self.maps.push(map);
        }
        Ok(())
    }

    fn persist(&mut self, header: &[u8; STORE_HEADER_LEN]) -> Result<()> {
        for map in &self.maps {
            map.flush()?;
        }
        let io = self.io()?;
        io.write_at(0, header)?;
        io.sync_all()
    }

    fn release(&mut self) {
        self.maps.clear();
        self.io = None;
    }
}

/// Memory-mapped store handed out by [`MmapDirectory`].
pub type MmapDataStore = SegmentedStore<MmapSegments>;

/// Directory backing every store with a memory-mapped file below `location`.
pub struct MmapDirectory {
    location: PathBuf,
    registry: StoreRegistry,
}

impl MmapDirectory {
    /// Opens (creating if needed) the folder holding the store files.
    pub fn new(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        fs::create_dir_all(&location)?;
        debug!(location = %location.display(), "directory.mmap.open");
        Ok(Self {
            location,
            registry: StoreRegistry::default(),
        })
    }

    fn handle(&self, name: &str, segment_size: u32) -> Result<MmapDataStore> {
        validate_store_name(name)?;
        let lease = self.registry.acquire(name)?;
        SegmentedStore::new(
            name,
            segment_size,
            MmapSegments::new(self.location.join(name)),
            lease,
        )
    }
}

impl Directory for MmapDirectory {
    fn kind(&self) -> StoreKind {
        StoreKind::Mmap
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.location)
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
        self.location.join(name).is_file()
    }

    fn remove(&self, name: &str) -> Result<()> {
        validate_store_name(name)?;
        if self.registry.is_open(name) {
            return Err(StoreError::IllegalState("cannot remove an open store"));
        }
        let path = self.location.join(name);
        if !path.is_file() {
            return Err(StoreError::NotFound(format!("store {name}")));
        }
        Ok(fs::remove_file(path)?)
    }

    fn store_names(&self) -> Result<Vec<String>> {
        list_store_files(&self.location)
    }
}
