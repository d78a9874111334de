#![forbid(unsafe_code)]
//! Encoding, varint, and buffer utilities shared across storage layers.

pub mod le {
    //! Fixed-width little-endian codecs used by every persisted record.
    //!
    //! All stores share this byte order so that a file written by one backend
    //! decodes identically when reopened by another.

    use core::convert::TryInto;

    /// Writes a u32 at the start of `dst`.
    pub fn put_u32(dst: &mut [u8], v: u32) {
        dst[..4].copy_from_slice(&v.to_le_bytes());
    }

    /// Reads a u32 from the start of `src`.
    pub fn get_u32(src: &[u8]) -> u32 {
        u32::from_le_bytes(src[..4].try_into().unwrap())
    }

    /// Writes an i32 at the start of `dst`.
    pub fn put_i32(dst: &mut [u8], v: i32) {
        dst[..4].copy_from_slice(&v.to_le_bytes());
    }

    /// Reads an i32 from the start of `src`.
    pub fn get_i32(src: &[u8]) -> i32 {
        i32::from_le_bytes(src[..4].try_into().unwrap())
    }

    /// Writes a u16 at the start of `dst`.
    pub fn put_u16(dst: &mut [u8], v: u16) {
        dst[..2].copy_from_slice(&v.to_le_bytes());
    }

    /// Reads a u16 from the start of `src`.
    pub fn get_u16(src: &[u8]) -> u16 {
        u16::from_le_bytes(src[..2].try_into().unwrap())
    }

    /// Writes a u64 at the start of `dst`.
    pub fn put_u64(dst: &mut [u8], v: u64) {
        dst[..8].copy_from_slice(&v.to_le_bytes());
    }

    /// Reads a u64 from the start of `src`.
    pub fn get_u64(src: &[u8]) -> u64 {
        u64::from_le_bytes(src[..8].try_into().unwrap())
    }

    /// Writes the raw bits of an f64.
    pub fn put_f64(dst: &mut [u8], v: f64) {
        put_u64(dst, v.to_bits());
    }

    /// Reads an f64 from its raw bits.
    pub fn get_f64(src: &[u8]) -> f64 {
        f64::from_bits(get_u64(src))
    }
}

pub mod var {
    //! Unsigned varints for blob length prefixes.

    use crate::types::{Result, StoreError};

    /// Encodes a u64 as an unsigned varint.
    pub fn encode_u64(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    /// Decodes a u64 varint from a slice, updating the offset.
    pub fn decode_u64(src: &[u8], off: &mut usize) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for i in 0..10 {
            let byte = *src
                .get(*off)
                .ok_or(StoreError::Corruption("varint truncated"))?;
            *off += 1;
            let payload = (byte & 0x7f) as u64;
            if i == 9 && payload > 1 {
                return Err(StoreError::Corruption("varint overflow"));
            }
            result |= payload << shift;
            if (byte & 0x80) == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(StoreError::Corruption("varint too long"))
    }

    /// Upper bound on the encoded length of any u64.
    pub const MAX_LEN: usize = 10;
}

pub mod buf {
    //! A simple slice-backed cursor for ergonomic parsing.

    use core::fmt;

    use super::le;
    use crate::types::{Result, StoreError};

    /// A cursor for reading bytes from a slice with offset tracking.
    pub struct Cursor<'a> {
        /// The underlying byte slice.
        pub buf: &'a [u8],
        /// Current read offset.
        pub off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Takes the next `n` bytes from the cursor, advancing the offset.
        pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
            let end = self
                .off
                .checked_add(n)
                .ok_or(StoreError::Corruption("cursor offset overflow"))?;
            if end > self.buf.len() {
                return Err(StoreError::Corruption("cursor take beyond buffer"));
            }
            let slice = &self.buf[self.off..end];
            self.off = end;
            Ok(slice)
        }

        /// Reads the next little-endian f64.
        pub fn f64(&mut self) -> Result<f64> {
            Ok(le::get_f64(self.take(8)?))
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }
    }

    impl<'a> fmt::Debug for Cursor<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }
}
