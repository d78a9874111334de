//! Fixed-width node records.
//!
//! Layout, little-endian:
//!
//! | offset | field                             |
//! |--------|-----------------------------------|
//! | 0      | adjacency head, edge id + 1 (u32) |
//! | 4      | latitude (f64)                    |
//! | 12     | longitude (f64)                   |
//! | 20     | elevation (f64), 3-D only         |
//! | 20/28  | turn-cost head, record + 1 (u32)  |
//!
//! Every reference is stored shifted by one so that an all-zero record reads as
//! "no edges, no turn costs".

use crate::directory::DataStore;
use crate::types::{NodeId, Result, StoreError};

const EDGE_HEAD: u64 = 0;
const LAT: u64 = 4;
const LON: u64 = 12;
const ELE: u64 = 20;

pub(crate) struct NodeTable {
    store: Box<dyn DataStore>,
    three_d: bool,
    width: u64,
    count: u32,
}

impl NodeTable {
    pub(crate) fn width_for(three_d: bool) -> u64 {
        if three_d {
            32
        } else {
            24
        }
    }

    pub(crate) fn new(store: Box<dyn DataStore>, three_d: bool, count: u32) -> Result<Self> {
        let width = Self::width_for(three_d);
        if count as u64 * width > store.capacity() {
            return Err(StoreError::Corruption("node count beyond node store capacity"));
        }
        Ok(Self {
            store,
            three_d,
            width,
            count,
        })
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn three_d(&self) -> bool {
        self.three_d
    }

    pub(crate) fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub(crate) fn store_mut(&mut self) -> &mut dyn DataStore {
        self.store.as_mut()
    }

    fn tc_field(&self) -> u64 {
        if self.three_d {
            28
        } else {
            20
        }
    }

    fn offset(&self, node: NodeId) -> u64 {
        node.0 as u64 * self.width
    }

    fn existing(&self, node: NodeId) -> Result<u64> {
        if node.0 >= self.count {
            return Err(StoreError::NotFound(format!("node {node}")));
        }
        Ok(self.offset(node))
    }

    /// Makes `node` addressable, growing the table. New records are zero.
    pub(crate) fn ensure(&mut self, node: NodeId) -> Result<u64> {
        if node.0 == u32::MAX {
            return Err(StoreError::Invalid("node id out of range"));
        }
        if node.0 >= self.count {
            let end = (node.0 as u64 + 1) * self.width;
            self.store.ensure_capacity(end)?;
            // Segments grow zeroed, but a reopened store may carry stale bytes past
            // the persisted count.
            let fresh = (node.0 - self.count + 1) as usize * self.width as usize;
            self.store.set_bytes(self.offset(NodeId(self.count)), &vec![0u8; fresh])?;
            self.count = node.0 + 1;
        }
        Ok(self.offset(node))
    }

    pub(crate) fn set_point(&mut self, node: NodeId, lat: f64, lon: f64) -> Result<()> {
        let at = self.ensure(node)?;
        self.store.set_f64(at + LAT, lat)?;
        self.store.set_f64(at + LON, lon)
    }

    pub(crate) fn set_elevation(&mut self, node: NodeId, ele: f64) -> Result<()> {
        if !self.three_d {
            return Err(StoreError::Invalid("elevation on a 2-D graph"));
        }
        let at = self.ensure(node)?;
        self.store.set_f64(at + ELE, ele)
    }

    pub(crate) fn lat(&self, node: NodeId) -> Result<f64> {
        self.store.get_f64(self.existing(node)? + LAT)
    }

    pub(crate) fn lon(&self, node: NodeId) -> Result<f64> {
        self.store.get_f64(self.existing(node)? + LON)
    }

    /// Elevation in 3-D mode, `None` on a 2-D graph.
    pub(crate) fn elevation(&self, node: NodeId) -> Result<Option<f64>> {
        let at = self.existing(node)?;
        if !self.three_d {
            return Ok(None);
        }
        self.store.get_f64(at + ELE).map(Some)
    }

    pub(crate) fn edge_head(&self, node: NodeId) -> Result<Option<u32>> {
        let raw = self.store.get_u32(self.existing(node)? + EDGE_HEAD)?;
        Ok(raw.checked_sub(1))
    }

    pub(crate) fn set_edge_head(&mut self, node: NodeId, edge: u32) -> Result<()> {
        let at = self.ensure(node)?;
        self.store.set_u32(at + EDGE_HEAD, shift_ref(edge)?)
    }

    pub(crate) fn turn_cost_head(&self, node: NodeId) -> Result<Option<u32>> {
        let raw = self.store.get_u32(self.existing(node)? + self.tc_field())?;
        Ok(raw.checked_sub(1))
    }

    /// Points `node` at a turn-cost record, or clears it with `None`.
    pub(crate) fn set_turn_cost_head(&mut self, node: NodeId, index: Option<u32>) -> Result<()> {
        let at = self.ensure(node)?;
        let raw = match index {
            Some(idx) => shift_ref(idx)?,
            None => 0,
        };
        let field = self.tc_field();
        self.store.set_u32(at + field, raw)
    }
}

/// Encodes a record reference so that zero stays free for "none".
fn shift_ref(idx: u32) -> Result<u32> {
    idx.checked_add(1)
        .ok_or(StoreError::Invalid("reference out of range"))
}
