use tracing::debug;

use super::header::{StoreHeader, STORE_HEADER_LEN};
use super::{validate_segment_size, DataStore, StoreKind, StoreLease};
use crate::types::{Result, StoreError};

/// Physical segment storage behind a [`SegmentedStore`].
///
/// Backends only allocate, expose and persist whole segments; addressing,
/// bounds checks and lifecycle live in the store.
pub trait SegmentBackend: Send + Sync {
    /// Backend family, reported through the owning store.
    fn kind(&self) -> StoreKind;
    /// Number of allocated segments.
    fn segment_count(&self) -> usize;
    /// Segment `idx`; callers stay below [`SegmentBackend::segment_count`].
    fn segment(&self, idx: usize) -> &[u8];
    /// Mutable segment `idx`.
    fn segment_mut(&mut self, idx: usize) -> &mut [u8];
    /// Prepares an empty body, discarding anything persisted under this name.
    fn open_new(&mut self) -> Result<()>;
    /// Appends zeroed segments until `count` exist.
    fn grow(&mut self, count: usize, segment_size: usize) -> Result<()>;
    /// Reads the persisted header bytes, or `None` when nothing was persisted.
    fn read_header(&mut self) -> Result<Option<[u8; STORE_HEADER_LEN]>>;
    /// Loads the body described by a validated header.
    fn load_body(&mut self, header: &StoreHeader) -> Result<()>;
    /// Writes header and body to durable storage.
    fn persist(&mut self, header: &[u8; STORE_HEADER_LEN]) -> Result<()>;
    /// Drops segments and handles.
    fn release(&mut self);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StoreState {
    Fresh,
    Open,
    Closed,
}

/// A [`DataStore`] over any [`SegmentBackend`].
pub struct SegmentedStore<B: SegmentBackend> {
    name: String,
    segment_size: u32,
    shift: u32,
    mask: u64,
    state: StoreState,
    backend: B,
    lease: Option<StoreLease>,
}

impl<B: SegmentBackend> SegmentedStore<B> {
    pub(crate) fn new(
        name: &str,
        segment_size: u32,
        backend: B,
        lease: StoreLease,
    ) -> Result<Self> {
        let segment_size = validate_segment_size(segment_size)?;
        Ok(Self {
            name: name.to_owned(),
            segment_size,
            shift: segment_size.trailing_zeros(),
            mask: segment_size as u64 - 1,
            state: StoreState::Fresh,
            backend,
            lease: Some(lease),
        })
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            StoreState::Open => Ok(()),
            StoreState::Fresh => Err(StoreError::IllegalState(
                "store used before create or load",
            )),
            StoreState::Closed => Err(StoreError::Closed),
        }
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len as u64)
            .ok_or(StoreError::Invalid("store offset overflow"))?;
        if end > self.capacity() {
            return Err(StoreError::Invalid("access beyond store capacity"));
        }
        Ok(())
    }

    fn segments_for(&self, bytes: u64) -> Result<usize> {
        let rounded = bytes.checked_add(self.mask).ok_or_else(|| {
            StoreError::Capacity(format!("store {} cannot hold {bytes} bytes", self.name))
        })?;
        usize::try_from((rounded >> self.shift).max(1)).map_err(|_| {
            StoreError::Capacity(format!("store {} cannot hold {bytes} bytes", self.name))
        })
    }

    fn grow_to(&mut self, segments: usize) -> Result<()> {
        let before = self.backend.segment_count();
        self.backend.grow(segments, self.segment_size as usize)?;
        debug!(
            store = %self.name,
            from = before,
            to = segments,
            segment_size = self.segment_size,
            "directory.store.grow"
        );
        Ok(())
    }
}

impl<B: SegmentBackend> DataStore for SegmentedStore<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StoreKind {
        self.backend.kind()
    }

    fn segment_size(&self) -> u32 {
        self.segment_size
    }

    fn segments(&self) -> usize {
        self.backend.segment_count()
    }

    fn create(&mut self, bytes: u64) -> Result<()> {
        match self.state {
            StoreState::Fresh => {}
            StoreState::Open => return Err(StoreError::IllegalState("store already created")),
            StoreState::Closed => return Err(StoreError::Closed),
        }
        let segments = self.segments_for(bytes)?;
        self.backend.open_new()?;
        self.grow_to(segments)?;
        self.state = StoreState::Open;
        debug!(store = %self.name, bytes, segments, "directory.store.create");
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        match self.state {
            StoreState::Fresh => {}
            StoreState::Open => return Err(StoreError::IllegalState("store already open")),
            StoreState::Closed => return Err(StoreError::Closed),
        }
        let Some(raw) = self.backend.read_header()? else {
            return Ok(false);
        };
        let header = StoreHeader::decode(&self.name, &raw)?;
        if header.segment_size != self.segment_size {
            self.backend.release();
            return Err(StoreError::Incompatible(format!(
                "store {} was written with segment size {} but {} is configured",
                self.name, header.segment_size, self.segment_size
            )));
        }
        self.backend.load_body(&header)?;
        self.state = StoreState::Open;
        debug!(
            store = %self.name,
            segments = header.segments(),
            "directory.store.load"
        );
        Ok(true)
    }

    fn ensure_capacity(&mut self, bytes: u64) -> Result<bool> {
        self.check_open()?;
        if bytes <= self.capacity() {
            return Ok(false);
        }
        let segments = self.segments_for(bytes)?;
        self.grow_to(segments)?;
        Ok(true)
    }

    fn get_bytes(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.check_open()?;
        self.check_range(offset, dst.len())?;
        let mut pos = offset;
        let mut done = 0usize;
        while done < dst.len() {
            let seg = (pos >> self.shift) as usize;
            let within = (pos & self.mask) as usize;
            let n = (self.segment_size as usize - within).min(dst.len() - done);
            dst[done..done + n].copy_from_slice(&self.backend.segment(seg)[within..within + n]);
            done += n;
            pos += n as u64;
        }
        Ok(())
    }

    fn set_bytes(&mut self, offset: u64, src: &[u8]) -> Result<()> {
        self.check_open()?;
        self.check_range(offset, src.len())?;
        let mut pos = offset;
        let mut done = 0usize;
        while done < src.len() {
            let seg = (pos >> self.shift) as usize;
            let within = (pos & self.mask) as usize;
            let n = (self.segment_size as usize - within).min(src.len() - done);
            self.backend.segment_mut(seg)[within..within + n]
                .copy_from_slice(&src[done..done + n]);
            done += n;
            pos += n as u64;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        let header = StoreHeader::new(self.segment_size, self.capacity());
        self.backend.persist(&header.encode(&self.name))?;
        debug!(store = %self.name, bytes = header.length, "directory.store.flush");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.state == StoreState::Closed {
            return Ok(());
        }
        self.backend.release();
        self.state = StoreState::Closed;
        self.lease = None;
        debug!(store = %self.name, "directory.store.close");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state == StoreState::Closed
    }
}
