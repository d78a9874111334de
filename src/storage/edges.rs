//! Fixed-width edge records with embedded adjacency links.
//!
//! | offset | field                                  |
//! |--------|----------------------------------------|
//! | 0      | base node (u32)                        |
//! | 4      | adjacent node (u32)                    |
//! | 8      | next edge at base, edge id + 1 (u32)   |
//! | 12     | next edge at adjacent, edge id + 1     |
//! | 16     | distance (f64)                         |
//! | 24     | geometry blob offset + 1 (u64)         |
//! | 32     | name blob offset + 1 (u64)             |
//! | 40     | edge flag word, `edge_ints` u32 values |

use super::nodes::NodeTable;
use crate::directory::DataStore;
use crate::encoding::Flags;
use crate::types::{EdgeId, NodeId, Result, StoreError};

const BASE: u64 = 0;
const ADJ: u64 = 4;
const NEXT_BASE: u64 = 8;
const NEXT_ADJ: u64 = 12;
const DISTANCE: u64 = 16;
const GEOMETRY: u64 = 24;
const NAME: u64 = 32;
const FLAGS: u64 = 40;

pub(crate) struct EdgeTable {
    store: Box<dyn DataStore>,
    flag_ints: usize,
    width: u64,
    count: u32,
}

impl EdgeTable {
    pub(crate) fn width_for(flag_ints: usize) -> u64 {
        FLAGS + 4 * flag_ints as u64
    }

    pub(crate) fn new(store: Box<dyn DataStore>, flag_ints: usize, count: u32) -> Result<Self> {
        let width = Self::width_for(flag_ints);
        if count as u64 * width > store.capacity() {
            return Err(StoreError::Corruption("edge count beyond edge store capacity"));
        }
        Ok(Self {
            store,
            flag_ints,
            width,
            count,
        })
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub(crate) fn store_mut(&mut self) -> &mut dyn DataStore {
        self.store.as_mut()
    }

    fn offset(&self, edge: EdgeId) -> Result<u64> {
        if edge.0 >= self.count {
            return Err(StoreError::NotFound(format!("edge {edge}")));
        }
        Ok(edge.0 as u64 * self.width)
    }

    /// Appends an edge and links it at the head of both endpoint lists.
    pub(crate) fn add(&mut self, nodes: &mut NodeTable, base: NodeId, adj: NodeId) -> Result<EdgeId> {
        if self.count == u32::MAX - 1 {
            return Err(StoreError::Capacity("edge ids exhausted".into()));
        }
        nodes.ensure(base)?;
        nodes.ensure(adj)?;
        let edge = EdgeId(self.count);
        let at = edge.0 as u64 * self.width;
        self.store.ensure_capacity(at + self.width)?;

        let mut record = vec![0u8; self.width as usize];
        let next_base = link(nodes.edge_head(base)?);
        let next_adj = if base == adj {
            next_base
        } else {
            link(nodes.edge_head(adj)?)
        };
        put(&mut record, BASE, base.0);
        put(&mut record, ADJ, adj.0);
        put(&mut record, NEXT_BASE, next_base);
        put(&mut record, NEXT_ADJ, next_adj);
        self.store.set_bytes(at, &record)?;
        self.count += 1;

        nodes.set_edge_head(base, edge.0)?;
        if base != adj {
            nodes.set_edge_head(adj, edge.0)?;
        }
        Ok(edge)
    }

    pub(crate) fn endpoints(&self, edge: EdgeId) -> Result<(NodeId, NodeId)> {
        let at = self.offset(edge)?;
        let mut buf = [0u8; 8];
        self.store.get_bytes(at + BASE, &mut buf)?;
        let base = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let adj = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Ok((NodeId(base), NodeId(adj)))
    }

    /// Successor of `edge` in the adjacency list of `node`.
    pub(crate) fn next_at(&self, edge: EdgeId, node: NodeId) -> Result<Option<EdgeId>> {
        let at = self.offset(edge)?;
        let (base, adj) = self.endpoints(edge)?;
        let field = if base == node {
            NEXT_BASE
        } else if adj == node {
            NEXT_ADJ
        } else {
            return Err(StoreError::Invalid("node is not an endpoint of the edge"));
        };
        let raw = self.store.get_u32(at + field)?;
        Ok(raw.checked_sub(1).map(EdgeId))
    }

    pub(crate) fn distance(&self, edge: EdgeId) -> Result<f64> {
        self.store.get_f64(self.offset(edge)? + DISTANCE)
    }

    pub(crate) fn set_distance(&mut self, edge: EdgeId, distance: f64) -> Result<()> {
        if !(distance.is_finite() && distance >= 0.0) {
            return Err(StoreError::Invalid("distance must be finite and non-negative"));
        }
        let at = self.offset(edge)?;
        self.store.set_f64(at + DISTANCE, distance)
    }

    pub(crate) fn flags(&self, edge: EdgeId) -> Result<Flags> {
        let at = self.offset(edge)?;
        let mut buf = vec![0u8; 4 * self.flag_ints];
        self.store.get_bytes(at + FLAGS, &mut buf)?;
        Ok(Flags::decode(&buf))
    }

    pub(crate) fn set_flags(&mut self, edge: EdgeId, flags: &Flags) -> Result<()> {
        if flags.len() != self.flag_ints {
            return Err(StoreError::Invalid("flag word width does not match the registry"));
        }
        let at = self.offset(edge)?;
        let mut buf = vec![0u8; flags.byte_len()];
        flags.encode_into(&mut buf);
        self.store.set_bytes(at + FLAGS, &buf)
    }

    pub(crate) fn geometry_ref(&self, edge: EdgeId) -> Result<Option<u64>> {
        let raw = self.store.get_u64(self.offset(edge)? + GEOMETRY)?;
        Ok(raw.checked_sub(1))
    }

    pub(crate) fn set_geometry_ref(&mut self, edge: EdgeId, offset: u64) -> Result<()> {
        let at = self.offset(edge)?;
        self.store.set_u64(at + GEOMETRY, offset + 1)
    }

    pub(crate) fn name_ref(&self, edge: EdgeId) -> Result<Option<u64>> {
        let raw = self.store.get_u64(self.offset(edge)? + NAME)?;
        Ok(raw.checked_sub(1))
    }

    pub(crate) fn set_name_ref(&mut self, edge: EdgeId, offset: u64) -> Result<()> {
        let at = self.offset(edge)?;
        self.store.set_u64(at + NAME, offset + 1)
    }
}

fn link(head: Option<u32>) -> u32 {
    head.map_or(0, |e| e + 1)
}

fn put(record: &mut [u8], field: u64, value: u32) {
    let at = field as usize;
    record[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Walks the adjacency list of one node, newest edge first.
pub(crate) struct AdjacencyWalk<'a> {
    edges: &'a EdgeTable,
    node: NodeId,
    next: Option<EdgeId>,
}

impl<'a> AdjacencyWalk<'a> {
    pub(crate) fn new(edges: &'a EdgeTable, nodes: &NodeTable, node: NodeId) -> Result<Self> {
        let next = nodes.edge_head(node)?.map(EdgeId);
        Ok(Self { edges, node, next })
    }
}

impl Iterator for AdjacencyWalk<'_> {
    type Item = Result<EdgeId>;

    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.next?;
        match self.edges.next_at(edge, self.node) {
            Ok(next) => {
                self.next = next;
                Some(Ok(edge))
            }
            Err(err) => {
                self.next = None;
                Some(Err(err))
            }
        }
    }
}
