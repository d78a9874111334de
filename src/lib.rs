//! Persistent storage for road-network routing graphs.
//!
//! Nodes, edges and turn costs live in fixed-width records inside segmented
//! [`directory::DataStore`]s, either on the heap or memory mapped. Vehicle
//! properties are bit-packed into flag words laid out by an
//! [`encoding::EncodingRegistry`]. [`storage::BaseGraph`] ties the tables together
//! and owns the create, flush, close and reload lifecycle.

#![warn(missing_docs)]

pub mod directory;
pub mod encoding;
pub mod primitives;
pub mod storage;
pub mod types;

pub use directory::{DataStore, Directory, MmapDirectory, RamDirectory, StoreKind};
pub use encoding::{EncodingRegistry, FlagValue, VehicleProfile};
pub use storage::{BaseGraph, FetchMode, GraphBuilder, GraphConfig, PointList};
pub use types::{EdgeId, NodeId, Result, StoreError};
