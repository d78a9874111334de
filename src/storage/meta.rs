use serde::{Deserialize, Serialize};

use crate::directory::DataStore;
use crate::encoding::RegistrySignature;
use crate::types::{Result, StoreError};

/// Format of the graph as a whole, independent of the per-store header version.
pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// Everything needed to reopen a graph, persisted next to its tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphMeta {
    /// Graph layout version, see [`GRAPH_FORMAT_VERSION`].
    pub format_version: u32,
    /// Node count.
    pub nodes: u32,
    /// Edge count.
    pub edges: u32,
    /// Turn-cost records in use.
    pub turn_cost_records: u32,
    /// Whether nodes carry an elevation.
    pub three_d: bool,
    /// Whether a turn-cost table exists.
    pub turn_costs: bool,
    /// Bytes used in the geometry store.
    pub geometry_bytes: u64,
    /// Bytes used in the name store.
    pub name_bytes: u64,
    /// Segment size of every store.
    pub segment_size: u32,
    /// Registered vehicle names.
    pub vehicles: Vec<String>,
    /// Layout of every encoded value.
    pub registry: RegistrySignature,
}

impl GraphMeta {
    /// Writes `u32 length | JSON` at the start of `store`.
    pub(crate) fn write_to(&self, store: &mut dyn DataStore) -> Result<()> {
        let json = serde_json::to_vec(self)
            .map_err(|e| StoreError::Config(format!("graph metadata: {e}")))?;
        let len = u32::try_from(json.len())
            .map_err(|_| StoreError::Capacity("graph metadata too large".into()))?;
        store.ensure_capacity(4 + json.len() as u64)?;
        store.set_u32(0, len)?;
        store.set_bytes(4, &json)
    }

    pub(crate) fn read_from(store: &dyn DataStore) -> Result<Self> {
        let len = store.get_u32(0)? as u64;
        if len == 0 || 4 + len > store.capacity() {
            return Err(StoreError::Corruption("graph metadata length out of range"));
        }
        let mut json = vec![0u8; len as usize];
        store.get_bytes(4, &mut json)?;
        serde_json::from_slice(&json)
            .map_err(|_| StoreError::Corruption("graph metadata is not valid JSON"))
    }
}
