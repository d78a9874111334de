//! Low-level primitives for building the storage engine.
//!
//! Includes fixed-width byte codecs and positioned file I/O.

/// Byte-level utilities and encoding/decoding.
///
/// Little-endian record codecs, varints and a slice cursor used by the tables.
pub mod bytes;

/// I/O abstractions and utilities.
///
/// Positioned reads and writes used by the persisted RAM store and the mmap store header.
pub mod io;
