//! The graph façade: owns every table of one graph and drives its lifecycle.
//!
//! ```text
//! Uninitialized --create--> Created --+
//!       |                             +--flush (any number of times)--+
//!       +------load_existing--> Loaded --+                            |
//!                                        +--------close-------> Closed
//! ```
//! Mutation is legal in `Created` and `Loaded`. `close` flushes first and may be
//! called again after it succeeded or failed.

use std::sync::Arc;

use tracing::{info, warn};

use super::blob::BlobStore;
use super::edge_state::{EdgeMut, EdgeView};
use super::edges::{AdjacencyWalk, EdgeTable};
use super::geometry::Point;
use super::meta::{GraphMeta, GRAPH_FORMAT_VERSION};
use super::nodes::NodeTable;
use super::options::GraphBuilder;
use super::turn_cost::{TurnCostEntry, TurnCostTable};
use crate::directory::{DataStore, Directory};
use crate::encoding::{EncodingRegistry, FlagValue, FlagWord};
use crate::types::{EdgeId, NodeId, Result, StoreError};

/// Lifecycle state of a [`BaseGraph`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GraphState {
    /// Built but neither created nor loaded.
    Uninitialized,
    /// Fresh tables from [`BaseGraph::create`].
    Created,
    /// Tables reopened by [`BaseGraph::load_existing`].
    Loaded,
    /// Closed; every further call fails.
    Closed,
}

/// The open stores of a graph.
pub(crate) struct Tables {
    pub(crate) nodes: NodeTable,
    pub(crate) edges: EdgeTable,
    pub(crate) turn_costs: Option<TurnCostTable>,
    pub(crate) geometry: BlobStore,
    pub(crate) names: BlobStore,
    pub(crate) meta: Box<dyn DataStore>,
}

impl Tables {
    fn stores_mut(&mut self) -> Vec<&mut dyn DataStore> {
        let mut stores: Vec<&mut dyn DataStore> = vec![
            self.nodes.store_mut(),
            self.edges.store_mut(),
            self.geometry.store_mut(),
            self.names.store_mut(),
        ];
        if let Some(tc) = self.turn_costs.as_mut() {
            stores.push(tc.store_mut());
        }
        stores.push(self.meta.as_mut());
        stores
    }
}

/// Names of the stores of a graph rooted at `root`.
#[derive(Clone, Debug)]
struct StoreNames {
    nodes: String,
    edges: String,
    turn_costs: String,
    geometry: String,
    names: String,
    properties: String,
}

impl StoreNames {
    fn new(root: &str) -> Self {
        Self {
            nodes: format!("{root}.nodes"),
            edges: format!("{root}.edges"),
            turn_costs: format!("{root}.turn_costs"),
            geometry: format!("{root}.geometry"),
            names: format!("{root}.names"),
            properties: format!("{root}.properties"),
        }
    }
}

/// A road graph stored in the segmented stores of one [`Directory`].
pub struct BaseGraph {
    dir: Arc<dyn Directory>,
    registry: Arc<EncodingRegistry>,
    root_name: String,
    names: StoreNames,
    segment_size: u32,
    three_d: bool,
    turn_costs: bool,
    state: GraphState,
    tables: Option<Tables>,
}

fn live(state: GraphState, tables: &Option<Tables>) -> Result<&Tables> {
    match state {
        GraphState::Created | GraphState::Loaded => tables
            .as_ref()
            .ok_or(StoreError::IllegalState("graph tables missing")),
        GraphState::Closed => Err(StoreError::Closed),
        GraphState::Uninitialized => Err(StoreError::IllegalState(
            "graph used before create or load_existing",
        )),
    }
}

fn live_mut(state: GraphState, tables: &mut Option<Tables>) -> Result<&mut Tables> {
    match state {
        GraphState::Created | GraphState::Loaded => tables
            .as_mut()
            .ok_or(StoreError::IllegalState("graph tables missing")),
        GraphState::Closed => Err(StoreError::Closed),
        GraphState::Uninitialized => Err(StoreError::IllegalState(
            "graph used before create or load_existing",
        )),
    }
}

impl BaseGraph {
    pub(crate) fn from_builder(b: GraphBuilder) -> Self {
        Self {
            names: StoreNames::new(&b.root_name),
            dir: b.dir,
            registry: b.registry,
            root_name: b.root_name,
            segment_size: b.segment_size,
            three_d: b.three_d,
            turn_costs: b.turn_costs,
            state: GraphState::Uninitialized,
            tables: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Whether nodes carry an elevation.
    pub fn is_3d(&self) -> bool {
        self.three_d
    }

    /// Whether the graph has a turn-cost table.
    pub fn has_turn_costs(&self) -> bool {
        self.turn_costs
    }

    /// Registry every flag word is laid out by.
    pub fn registry(&self) -> &Arc<EncodingRegistry> {
        &self.registry
    }

    /// Directory the stores come from.
    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.dir
    }

    /// Prefix of every store name.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Segment size of every store.
    pub fn segment_size(&self) -> u32 {
        self.segment_size
    }

    fn check_fresh(&self) -> Result<()> {
        match self.state {
            GraphState::Uninitialized => Ok(()),
            GraphState::Closed => Err(StoreError::Closed),
            _ => Err(StoreError::IllegalState("graph already created or loaded")),
        }
    }

    fn new_store(&self, name: &str, bytes: u64) -> Result<Box<dyn DataStore>> {
        let mut store = self.dir.create(name, self.segment_size)?;
        store.create(bytes)?;
        Ok(store)
    }

    /// Initialises empty tables sized for `expected_nodes` nodes.
    ///
    /// Stores opened before a failure are released when the partial set drops.
    pub fn create(&mut self, expected_nodes: u32) -> Result<()> {
        self.check_fresh()?;
        let n = expected_nodes as u64;
        let nodes = self.new_store(&self.names.nodes, n * NodeTable::width_for(self.three_d))?;
        let edges = self.new_store(
            &self.names.edges,
            n * EdgeTable::width_for(self.registry.edge_ints()),
        )?;
        let turn_costs = if self.turn_costs {
            let store = self.new_store(&self.names.turn_costs, n)?;
            Some(TurnCostTable::new(store, self.registry.turn_cost_ints(), 0)?)
        } else {
            None
        };
        let geometry = self.new_store(&self.names.geometry, n * 4)?;
        let names = self.new_store(&self.names.names, n * 4)?;
        let meta = self.new_store(&self.names.properties, 0)?;
        self.tables = Some(Tables {
            nodes: NodeTable::new(nodes, self.three_d, 0)?,
            edges: EdgeTable::new(edges, self.registry.edge_ints(), 0)?,
            turn_costs,
            geometry: BlobStore::new(geometry, 0)?,
            names: BlobStore::new(names, 0)?,
            meta,
        });
        self.state = GraphState::Created;
        info!(
            root = %self.root_name,
            expected_nodes,
            three_d = self.three_d,
            turn_costs = self.turn_costs,
            segment_size = self.segment_size,
            "graph.create"
        );
        Ok(())
    }

    fn reject(&self, reason: String) -> StoreError {
        warn!(root = %self.root_name, reason = %reason, "graph.load.rejected");
        StoreError::Incompatible(reason)
    }

    fn check_meta(&self, meta: &GraphMeta) -> Result<()> {
        if meta.format_version != GRAPH_FORMAT_VERSION {
            return Err(self.reject(format!(
                "graph format version {} is not supported (expected {GRAPH_FORMAT_VERSION})",
                meta.format_version
            )));
        }
        if meta.segment_size != self.segment_size {
            return Err(self.reject(format!(
                "graph was written with segment size {} but {} is configured",
                meta.segment_size, self.segment_size
            )));
        }
        if meta.three_d != self.three_d {
            return Err(self.reject(format!(
                "graph was written with 3-D {} but 3-D {} is configured",
                meta.three_d, self.three_d
            )));
        }
        if meta.turn_costs != self.turn_costs {
            return Err(self.reject(format!(
                "graph was written with turn costs {} but turn costs {} is configured",
                meta.turn_costs, self.turn_costs
            )));
        }
        if let Some(diff) = meta.registry.difference(&self.registry.signature()) {
            return Err(self.reject(format!("encoding registry mismatch: {diff}")));
        }
        Ok(())
    }

    fn load_store(&self, name: &str) -> Result<Box<dyn DataStore>> {
        self.dir
            .find(name, self.segment_size)?
            .ok_or(StoreError::Corruption("graph store missing next to its metadata"))
    }

    /// Reopens a flushed graph. Returns `Ok(false)` when the directory holds none.
    pub fn load_existing(&mut self) -> Result<bool> {
        self.check_fresh()?;
        let Some(meta_store) = self.dir.find(&self.names.properties, self.segment_size)? else {
            return Ok(false);
        };
        let meta = GraphMeta::read_from(meta_store.as_ref())?;
        self.check_meta(&meta)?;

        let nodes = NodeTable::new(self.load_store(&self.names.nodes)?, self.three_d, meta.nodes)?;
        let edges = EdgeTable::new(
            self.load_store(&self.names.edges)?,
            self.registry.edge_ints(),
            meta.edges,
        )?;
        let turn_costs = if self.turn_costs {
            Some(TurnCostTable::new(
                self.load_store(&self.names.turn_costs)?,
                self.registry.turn_cost_ints(),
                meta.turn_cost_records,
            )?)
        } else {
            None
        };
        let geometry = BlobStore::new(self.load_store(&self.names.geometry)?, meta.geometry_bytes)?;
        let names = BlobStore::new(self.load_store(&self.names.names)?, meta.name_bytes)?;
        self.tables = Some(Tables {
            nodes,
            edges,
            turn_costs,
            geometry,
            names,
            meta: meta_store,
        });
        self.state = GraphState::Loaded;
        info!(
            root = %self.root_name,
            nodes = meta.nodes,
            edges = meta.edges,
            turn_cost_records = meta.turn_cost_records,
            "graph.load"
        );
        Ok(true)
    }

    fn snapshot_meta(&self, tables: &Tables) -> GraphMeta {
        GraphMeta {
            format_version: GRAPH_FORMAT_VERSION,
            nodes: tables.nodes.count(),
            edges: tables.edges.count(),
            turn_cost_records: tables.turn_costs.as_ref().map_or(0, |tc| tc.count()),
            three_d: self.three_d,
            turn_costs: self.turn_costs,
            geometry_bytes: tables.geometry.len(),
            name_bytes: tables.names.len(),
            segment_size: self.segment_size,
            vehicles: self.registry.vehicles().to_vec(),
            registry: self.registry.signature(),
        }
    }

    /// Persists metadata and every table without closing.
    pub fn flush(&mut self) -> Result<()> {
        let meta = self.snapshot_meta(live(self.state, &self.tables)?);
        let tables = live_mut(self.state, &mut self.tables)?;
        meta.write_to(tables.meta.as_mut())?;
        for store in tables.stores_mut() {
            store.flush()?;
        }
        Ok(())
    }

    /// Flushes and releases every store. A second call is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let flushed = match self.state {
            GraphState::Closed => return Ok(()),
            GraphState::Uninitialized => Ok(()),
            GraphState::Created | GraphState::Loaded => self.flush(),
        };
        let mut closed = Ok(());
        if let Some(mut tables) = self.tables.take() {
            for store in tables.stores_mut() {
                let res = store.close();
                if closed.is_ok() {
                    closed = res;
                }
            }
        }
        self.state = GraphState::Closed;
        info!(root = %self.root_name, "graph.close");
        flushed.and(closed)
    }

    /// Number of nodes, one past the highest id written.
    pub fn node_count(&self) -> Result<u32> {
        Ok(live(self.state, &self.tables)?.nodes.count())
    }

    /// Number of edges.
    pub fn edge_count(&self) -> Result<u32> {
        Ok(live(self.state, &self.tables)?.edges.count())
    }

    /// Sets latitude and longitude, creating the node if needed. Elevation and
    /// the turn-cost index are untouched.
    pub fn set_node(&mut self, node: NodeId, lat: f64, lon: f64) -> Result<()> {
        live_mut(self.state, &mut self.tables)?
            .nodes
            .set_point(node, lat, lon)
    }

    /// Sets all coordinates of a node of a 3-D graph.
    pub fn set_node_with_elevation(&mut self, node: NodeId, lat: f64, lon: f64, ele: f64) -> Result<()> {
        let tables = live_mut(self.state, &mut self.tables)?;
        if !tables.nodes.three_d() {
            return Err(StoreError::Invalid("elevation on a 2-D graph"));
        }
        tables.nodes.set_point(node, lat, lon)?;
        tables.nodes.set_elevation(node, ele)
    }

    /// Latitude of a node.
    pub fn lat(&self, node: NodeId) -> Result<f64> {
        live(self.state, &self.tables)?.nodes.lat(node)
    }

    /// Longitude of a node.
    pub fn lon(&self, node: NodeId) -> Result<f64> {
        live(self.state, &self.tables)?.nodes.lon(node)
    }

    /// Elevation of a node; always `None` on a 2-D graph.
    pub fn elevation(&self, node: NodeId) -> Result<Option<f64>> {
        live(self.state, &self.tables)?.nodes.elevation(node)
    }

    /// All coordinates of a node.
    pub fn point(&self, node: NodeId) -> Result<Point> {
        let nodes = &live(self.state, &self.tables)?.nodes;
        Ok(Point {
            lat: nodes.lat(node)?,
            lon: nodes.lon(node)?,
            ele: nodes.elevation(node)?,
        })
    }

    /// Head of the node's turn-cost list, `None` when it has none.
    pub fn turn_cost_index(&self, node: NodeId) -> Result<Option<u32>> {
        live(self.state, &self.tables)?.nodes.turn_cost_head(node)
    }

    /// Overwrites the head of the node's turn-cost list, creating the node if needed.
    ///
    /// The index is stored as given. A head that names no record of the turn-cost
    /// table makes later turn-cost reads and writes at this node fail with
    /// [`StoreError::Corruption`] until it is reset to `None` or a valid record.
    pub fn set_turn_cost_index(&mut self, node: NodeId, index: Option<u32>) -> Result<()> {
        live_mut(self.state, &mut self.tables)?
            .nodes
            .set_turn_cost_head(node, index)
    }

    /// Adds an edge between `base` and `adj`, creating missing nodes.
    pub fn edge(&mut self, base: NodeId, adj: NodeId) -> Result<EdgeMut<'_>> {
        let registry = &*self.registry;
        let tables = live_mut(self.state, &mut self.tables)?;
        let edge = tables.edges.add(&mut tables.nodes, base, adj)?;
        EdgeMut::open(tables, registry, edge, None)
    }

    /// Edge in its stored orientation.
    pub fn edge_view(&self, edge: EdgeId) -> Result<EdgeView<'_>> {
        EdgeView::open(live(self.state, &self.tables)?, &self.registry, edge, None)
    }

    /// Edge oriented so that its adjacent node is `adj`.
    pub fn edge_state(&self, edge: EdgeId, adj: NodeId) -> Result<EdgeView<'_>> {
        EdgeView::open(live(self.state, &self.tables)?, &self.registry, edge, Some(adj))
    }

    /// Mutable handle oriented so that its adjacent node is `adj`.
    pub fn edge_mut(&mut self, edge: EdgeId, adj: NodeId) -> Result<EdgeMut<'_>> {
        let registry = &*self.registry;
        let tables = live_mut(self.state, &mut self.tables)?;
        EdgeMut::open(tables, registry, edge, Some(adj))
    }

    /// Every edge touching `node`, newest first, each oriented with `node` as base.
    pub fn edges_of(&self, node: NodeId) -> Result<Vec<EdgeView<'_>>> {
        let tables = live(self.state, &self.tables)?;
        AdjacencyWalk::new(&tables.edges, &tables.nodes, node)?
            .map(|edge| EdgeView::from_base(tables, &self.registry, edge?, node))
            .collect()
    }

    fn turn_table(&self) -> Result<(&Tables, &TurnCostTable)> {
        let tables = live(self.state, &self.tables)?;
        let table = tables
            .turn_costs
            .as_ref()
            .ok_or(StoreError::IllegalState("turn costs are disabled for this graph"))?;
        Ok((tables, table))
    }

    /// Stores `value` for turning from `from` via `via` onto `to`.
    pub fn set_turn_cost<V: FlagValue>(
        &mut self,
        value: &V,
        from: EdgeId,
        via: NodeId,
        to: EdgeId,
        cost: V::Value,
    ) -> Result<()> {
        self.registry.check_owned(value.encoded(), FlagWord::TurnCost)?;
        let tables = live_mut(self.state, &mut self.tables)?;
        let table = tables
            .turn_costs
            .as_mut()
            .ok_or(StoreError::IllegalState("turn costs are disabled for this graph"))?;
        table.merge(&mut tables.nodes, from, via, to, |flags| {
            value.write(flags, false, cost)
        })
    }

    /// Cost of turning from `from` via `via` onto `to`; the zero value when unset.
    pub fn turn_cost<V: FlagValue>(
        &self,
        value: &V,
        from: EdgeId,
        via: NodeId,
        to: EdgeId,
    ) -> Result<V::Value> {
        self.registry.check_owned(value.encoded(), FlagWord::TurnCost)?;
        let (tables, table) = self.turn_table()?;
        let flags = table
            .flags(&tables.nodes, from, via, to)?
            .unwrap_or_else(|| self.registry.empty_flags(FlagWord::TurnCost));
        value.read(&flags, false)
    }

    /// Every turn-cost record stored at `via`, newest first.
    pub fn turn_costs_of(&self, via: NodeId) -> Result<Vec<TurnCostEntry>> {
        let (tables, table) = self.turn_table()?;
        table.entries(&tables.nodes, via)
    }

    /// Turn-cost records ever appended.
    pub fn turn_cost_count(&self) -> Result<u32> {
        Ok(self.turn_table()?.1.count())
    }

    /// Allocated bytes of the turn-cost store.
    pub fn turn_cost_capacity(&self) -> Result<u64> {
        Ok(self.turn_table()?.1.store().capacity())
    }

    /// Allocated bytes of the node and edge stores.
    pub fn table_capacity(&self) -> Result<(u64, u64)> {
        let tables = live(self.state, &self.tables)?;
        Ok((tables.nodes.store().capacity(), tables.edges.store().capacity()))
    }
}
