//! Oriented handles onto one edge record.
//!
//! An edge is stored once with a base and an adjacent node. A handle opened from
//! the adjacent side is *reversed*: it reports the endpoints swapped, reads and
//! writes the backward slot of two-directional values as its forward slot, and
//! returns geometry in the opposite order.

use super::base_graph::Tables;
use super::geometry::{FetchMode, Point, PointList};
use crate::encoding::{EncodingRegistry, FlagValue, FlagWord, Flags};
use crate::types::{EdgeId, NodeId, Result, StoreError};

#[derive(Clone, Copy, Debug)]
struct Orientation {
    edge: EdgeId,
    base: NodeId,
    adj: NodeId,
    reversed: bool,
}

impl Orientation {
    fn resolve(tables: &Tables, edge: EdgeId, adj: Option<NodeId>) -> Result<Self> {
        let (base, stored_adj) = tables.edges.endpoints(edge)?;
        let reversed = match adj {
            None => false,
            Some(n) if n == stored_adj => false,
            Some(n) if n == base => true,
            Some(_) => return Err(StoreError::Invalid("node is not an endpoint of the edge")),
        };
        Ok(if reversed {
            Self {
                edge,
                base: stored_adj,
                adj: base,
                reversed,
            }
        } else {
            Self {
                edge,
                base,
                adj: stored_adj,
                reversed,
            }
        })
    }
}

fn node_point(tables: &Tables, node: NodeId) -> Result<Point> {
    Ok(Point {
        lat: tables.nodes.lat(node)?,
        lon: tables.nodes.lon(node)?,
        ele: tables.nodes.elevation(node)?,
    })
}

fn read_geometry(tables: &Tables, o: Orientation, mode: FetchMode) -> Result<PointList> {
    let mut pillars = match tables.edges.geometry_ref(o.edge)? {
        Some(at) => PointList::decode(&tables.geometry.read(at)?, tables.nodes.three_d())?,
        None => PointList::new(),
    };
    if o.reversed {
        pillars.reverse();
    }
    let mut out = PointList::new();
    if mode.includes_base() {
        out.push(node_point(tables, o.base)?);
    }
    for p in pillars.points() {
        out.push(*p);
    }
    if mode.includes_adj() {
        out.push(node_point(tables, o.adj)?);
    }
    Ok(out)
}

fn read_name(tables: &Tables, edge: EdgeId) -> Result<Option<String>> {
    match tables.edges.name_ref(edge)? {
        Some(at) => String::from_utf8(tables.names.read(at)?)
            .map(Some)
            .map_err(|_| StoreError::Corruption("edge name is not UTF-8")),
        None => Ok(None),
    }
}

fn read_value<V: FlagValue>(
    tables: &Tables,
    registry: &EncodingRegistry,
    o: Orientation,
    value: &V,
    reverse: bool,
) -> Result<V::Value> {
    registry.check_owned(value.encoded(), FlagWord::Edge)?;
    let flags = tables.edges.flags(o.edge)?;
    value.read(&flags, reverse != o.reversed)
}

/// Read-only oriented view of an edge.
pub struct EdgeView<'g> {
    tables: &'g Tables,
    registry: &'g EncodingRegistry,
    o: Orientation,
}

impl<'g> EdgeView<'g> {
    pub(crate) fn open(
        tables: &'g Tables,
        registry: &'g EncodingRegistry,
        edge: EdgeId,
        adj: Option<NodeId>,
    ) -> Result<Self> {
        let o = Orientation::resolve(tables, edge, adj)?;
        Ok(Self { tables, registry, o })
    }

    pub(crate) fn from_base(
        tables: &'g Tables,
        registry: &'g EncodingRegistry,
        edge: EdgeId,
        base: NodeId,
    ) -> Result<Self> {
        let (stored_base, stored_adj) = tables.edges.endpoints(edge)?;
        let adj = if stored_base == base { stored_adj } else { stored_base };
        Self::open(tables, registry, edge, Some(adj))
    }

    /// Underlying edge id.
    pub fn edge(&self) -> EdgeId {
        self.o.edge
    }

    /// Node this view starts at.
    pub fn base_node(&self) -> NodeId {
        self.o.base
    }

    /// Node this view ends at.
    pub fn adj_node(&self) -> NodeId {
        self.o.adj
    }

    /// Whether this view runs against the stored direction.
    pub fn is_reversed(&self) -> bool {
        self.o.reversed
    }

    /// Edge length in meters.
    pub fn distance(&self) -> Result<f64> {
        self.tables.edges.distance(self.o.edge)
    }

    /// Raw stored flag word, not affected by orientation.
    pub fn flags(&self) -> Result<Flags> {
        self.tables.edges.flags(self.o.edge)
    }

    /// Value in the direction of this view.
    pub fn get<V: FlagValue>(&self, value: &V) -> Result<V::Value> {
        read_value(&*self.tables, self.registry, self.o, value, false)
    }

    /// Value against the direction of this view.
    pub fn get_reverse<V: FlagValue>(&self, value: &V) -> Result<V::Value> {
        read_value(&*self.tables, self.registry, self.o, value, true)
    }

    /// Geometry in view direction, with the endpoints `mode` asks for.
    pub fn geometry(&self, mode: FetchMode) -> Result<PointList> {
        read_geometry(&*self.tables, self.o, mode)
    }

    /// Street name, if one was set.
    pub fn name(&self) -> Result<Option<String>> {
        read_name(&*self.tables, self.o.edge)
    }
}

/// Mutable oriented handle to an edge; setters chain via `?`.
pub struct EdgeMut<'g> {
    tables: &'g mut Tables,
    registry: &'g EncodingRegistry,
    o: Orientation,
}

impl<'g> EdgeMut<'g> {
    pub(crate) fn open(
        tables: &'g mut Tables,
        registry: &'g EncodingRegistry,
        edge: EdgeId,
        adj: Option<NodeId>,
    ) -> Result<Self> {
        let o = Orientation::resolve(tables, edge, adj)?;
        Ok(Self { tables, registry, o })
    }

    /// Underlying edge id.
    pub fn edge(&self) -> EdgeId {
        self.o.edge
    }

    /// Node this handle starts at.
    pub fn base_node(&self) -> NodeId {
        self.o.base
    }

    /// Node this handle ends at.
    pub fn adj_node(&self) -> NodeId {
        self.o.adj
    }

    /// Whether this handle runs against the stored direction.
    pub fn is_reversed(&self) -> bool {
        self.o.reversed
    }

    /// Read-only view with the same orientation.
    pub fn view(&self) -> EdgeView<'_> {
        EdgeView {
            tables: &*self.tables,
            registry: self.registry,
            o: self.o,
        }
    }

    /// Edge length in meters.
    pub fn distance(&self) -> Result<f64> {
        self.tables.edges.distance(self.o.edge)
    }

    /// Value in the direction of this handle.
    pub fn get<V: FlagValue>(&self, value: &V) -> Result<V::Value> {
        read_value(&*self.tables, self.registry, self.o, value, false)
    }

    /// Value against the direction of this handle.
    pub fn get_reverse<V: FlagValue>(&self, value: &V) -> Result<V::Value> {
        read_value(&*self.tables, self.registry, self.o, value, true)
    }

    /// Geometry in handle direction.
    pub fn geometry(&self, mode: FetchMode) -> Result<PointList> {
        read_geometry(&*self.tables, self.o, mode)
    }

    /// Street name, if one was set.
    pub fn name(&self) -> Result<Option<String>> {
        read_name(&*self.tables, self.o.edge)
    }

    /// Sets the length in meters; it must be finite and not negative.
    pub fn set_distance(&mut self, distance: f64) -> Result<&mut Self> {
        self.tables.edges.set_distance(self.o.edge, distance)?;
        Ok(self)
    }

    /// Replaces the whole flag word.
    pub fn set_flags(&mut self, flags: &Flags) -> Result<&mut Self> {
        self.tables.edges.set_flags(self.o.edge, flags)?;
        Ok(self)
    }

    fn write<V: FlagValue>(&mut self, value: &V, writes: &[(bool, V::Value)]) -> Result<()>
    where
        V::Value: Copy,
    {
        self.registry.check_owned(value.encoded(), FlagWord::Edge)?;
        let mut flags = self.tables.edges.flags(self.o.edge)?;
        for &(reverse, v) in writes {
            value.write(&mut flags, reverse != self.o.reversed, v)?;
        }
        self.tables.edges.set_flags(self.o.edge, &flags)
    }

    /// Sets the value in the direction of this handle.
    pub fn set<V: FlagValue>(&mut self, value: &V, v: V::Value) -> Result<&mut Self>
    where
        V::Value: Copy,
    {
        self.write(value, &[(false, v)])?;
        Ok(self)
    }

    /// Sets the value against the direction of this handle.
    pub fn set_reverse<V: FlagValue>(&mut self, value: &V, v: V::Value) -> Result<&mut Self>
    where
        V::Value: Copy,
    {
        self.write(value, &[(true, v)])?;
        Ok(self)
    }

    /// Sets both directions of a two-directional value at once.
    pub fn set_both<V: FlagValue>(
        &mut self,
        value: &V,
        forward: V::Value,
        backward: V::Value,
    ) -> Result<&mut Self>
    where
        V::Value: Copy,
    {
        if !value.encoded().two_directions() {
            return Err(StoreError::Invalid("encoded value has a single direction"));
        }
        self.write(value, &[(false, forward), (true, backward)])?;
        Ok(self)
    }

    /// Stores the intermediate points, given in the direction of this handle.
    pub fn set_way_geometry(&mut self, points: &PointList) -> Result<&mut Self> {
        let mut stored = points.clone();
        if self.o.reversed {
            stored.reverse();
        }
        let bytes = stored.encode(self.tables.nodes.three_d())?;
        if let Some(at) = self.tables.edges.geometry_ref(self.o.edge)? {
            if self.tables.geometry.overwrite(at, &bytes)? {
                return Ok(self);
            }
        }
        let at = self.tables.geometry.append(&bytes)?;
        self.tables.edges.set_geometry_ref(self.o.edge, at)?;
        Ok(self)
    }

    /// Sets the street name, rewriting in place when the length is unchanged.
    pub fn set_name(&mut self, name: &str) -> Result<&mut Self> {
        if let Some(at) = self.tables.edges.name_ref(self.o.edge)? {
            if self.tables.names.overwrite(at, name.as_bytes())? {
                return Ok(self);
            }
        }
        let at = self.tables.names.append(name.as_bytes())?;
        self.tables.edges.set_name_ref(self.o.edge, at)?;
        Ok(self)
    }
}
