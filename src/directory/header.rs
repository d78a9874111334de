use core::ops::Range;

use crate::primitives::bytes::le;
use crate::types::{header_crc32, Result, StoreError};

/// Magic prefix of every persisted store file.
pub const STORE_MAGIC: [u8; 8] = *b"RTSTORE\0";
/// Version of the header and body layout.
pub const STORE_FORMAT_VERSION: u16 = 1;
/// Bytes reserved in front of the segment body.
pub const STORE_HEADER_LEN: usize = 64;

const MAGIC: Range<usize> = 0..8;
const FORMAT_VERSION: Range<usize> = 8..10;
const RESERVED: Range<usize> = 10..12;
const SEGMENT_SIZE: Range<usize> = 12..16;
const LENGTH: Range<usize> = 16..24;
const CRC32: Range<usize> = 24..28;

/// Fixed header written in front of a store body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoreHeader {
    /// Layout version the body was written with.
    pub format_version: u16,
    /// Segment size the store was created with.
    pub segment_size: u32,
    /// Body length in bytes, always a multiple of `segment_size`.
    pub length: u64,
}

impl StoreHeader {
    /// Header for a body of `length` bytes at the current format version.
    pub fn new(segment_size: u32, length: u64) -> Self {
        Self {
            format_version: STORE_FORMAT_VERSION,
            segment_size,
            length,
        }
    }

    /// Number of whole segments the body spans.
    pub fn segments(&self) -> usize {
        (self.length / self.segment_size as u64) as usize
    }

    /// Serialises the header, checksummed against `store_name`.
    pub fn encode(&self, store_name: &str) -> [u8; STORE_HEADER_LEN] {
        let mut hdr = [0u8; STORE_HEADER_LEN];
        hdr[MAGIC].copy_from_slice(&STORE_MAGIC);
        le::put_u16(&mut hdr[FORMAT_VERSION], self.format_version);
        hdr[RESERVED].fill(0);
        le::put_u32(&mut hdr[SEGMENT_SIZE], self.segment_size);
        le::put_u64(&mut hdr[LENGTH], self.length);
        let crc = header_crc32(store_name, &hdr[..CRC32.start]);
        le::put_u32(&mut hdr[CRC32], crc);
        hdr
    }

    /// Parses and validates a header read from the store `store_name`.
    pub fn decode(store_name: &str, src: &[u8]) -> Result<Self> {
        if src.len() < STORE_HEADER_LEN {
            return Err(StoreError::Corruption("store header truncated"));
        }
        if src[MAGIC] != STORE_MAGIC {
            return Err(StoreError::Corruption("invalid store magic"));
        }
        let crc = le::get_u32(&src[CRC32]);
        if crc != header_crc32(store_name, &src[..CRC32.start]) {
            return Err(StoreError::Corruption("store header checksum mismatch"));
        }
        let format_version = le::get_u16(&src[FORMAT_VERSION]);
        if format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::Incompatible(format!(
                "store {store_name} has format version {format_version}, expected {STORE_FORMAT_VERSION}"
            )));
        }
        let segment_size = le::get_u32(&src[SEGMENT_SIZE]);
        let length = le::get_u64(&src[LENGTH]);
        if segment_size == 0 || length % segment_size as u64 != 0 {
            return Err(StoreError::Corruption(
                "store length is not segment aligned",
            ));
        }
        Ok(Self {
            format_version,
            segment_size,
            length,
        })
    }
}
