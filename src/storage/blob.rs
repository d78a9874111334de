use crate::directory::DataStore;
use crate::primitives::bytes::var;
use crate::types::{Result, StoreError};

/// Append-only store of length-prefixed byte strings (geometry, names).
///
/// Offsets of appended payloads never change; a payload of identical length may
/// be overwritten in place.
pub(crate) struct BlobStore {
    store: Box<dyn DataStore>,
    len: u64,
}

impl BlobStore {
    pub(crate) fn new(store: Box<dyn DataStore>, len: u64) -> Result<Self> {
        if len > store.capacity() {
            return Err(StoreError::Corruption("blob length beyond store capacity"));
        }
        Ok(Self { store, len })
    }

    /// Bytes in use.
    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    pub(crate) fn store_mut(&mut self) -> &mut dyn DataStore {
        self.store.as_mut()
    }

    /// Appends `payload` and returns its offset.
    pub(crate) fn append(&mut self, payload: &[u8]) -> Result<u64> {
        let offset = self.len;
        let mut framed = Vec::with_capacity(payload.len() + var::MAX_LEN);
        var::encode_u64(payload.len() as u64, &mut framed);
        framed.extend_from_slice(payload);
        let end = offset + framed.len() as u64;
        self.store.ensure_capacity(end)?;
        self.store.set_bytes(offset, &framed)?;
        self.len = end;
        Ok(offset)
    }

    /// Replaces the payload at `offset` when `payload` has the same length.
    /// Returns `false` and writes nothing otherwise.
    pub(crate) fn overwrite(&mut self, offset: u64, payload: &[u8]) -> Result<bool> {
        let (start, len) = self.frame(offset)?;
        if len != payload.len() {
            return Ok(false);
        }
        self.store.set_bytes(start, payload)?;
        Ok(true)
    }

    pub(crate) fn read(&self, offset: u64) -> Result<Vec<u8>> {
        let (start, len) = self.frame(offset)?;
        let mut out = vec![0u8; len];
        self.store.get_bytes(start, &mut out)?;
        Ok(out)
    }

    fn frame(&self, offset: u64) -> Result<(u64, usize)> {
        if offset >= self.len {
            return Err(StoreError::Corruption("blob reference beyond end"));
        }
        let avail = (self.len - offset).min(var::MAX_LEN as u64) as usize;
        let mut prefix = [0u8; var::MAX_LEN];
        self.store.get_bytes(offset, &mut prefix[..avail])?;
        let mut off = 0usize;
        let len = var::decode_u64(&prefix[..avail], &mut off)?;
        let start = offset + off as u64;
        if start + len > self.len {
            return Err(StoreError::Corruption("blob payload beyond end"));
        }
        Ok((start, len as usize))
    }
}
