//! Identifiers, the shared error type and checksums.

use std::fmt;

/// CRC helpers for store headers.
pub mod checksum;

pub use checksum::header_crc32;

/// Dense node identifier in `[0, node_count)`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(pub u32);

/// Sequential edge identifier in `[0, edge_count)`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EdgeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u32 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl From<u32> for EdgeId {
    fn from(value: u32) -> Self {
        EdgeId(value)
    }
}

impl From<EdgeId> for u32 {
    fn from(value: EdgeId) -> Self {
        value.0
    }
}

/// Errors surfaced by the storage engine.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying file or mapping failure.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Persisted bytes do not decode.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Rejected configuration, reported at construction.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Persisted data does not match the configured graph.
    #[error("incompatible store: {0}")]
    Incompatible(String),
    /// A backing store could not grow.
    #[error("capacity: {0}")]
    Capacity(String),
    /// Caller supplied an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// A node, edge, store or encoded value that was never created.
    #[error("{0} not found")]
    NotFound(String),
    /// The graph or store was already closed.
    #[error("graph is closed")]
    Closed,
    /// Operation not legal in the current lifecycle state.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
