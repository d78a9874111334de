//! Graph tables and the [`BaseGraph`] façade.
//!
//! A graph is a handful of segmented stores named after its root: fixed-width
//! node, edge and turn-cost records, two append-only blob stores for way geometry
//! and names, and a properties store with the metadata needed to reopen it.

mod base_graph;
mod blob;
mod config;
mod edge_state;
mod edges;
mod geometry;
mod meta;
mod nodes;
mod options;
mod turn_cost;

pub use base_graph::{BaseGraph, GraphState};
pub use config::GraphConfig;
pub use edge_state::{EdgeMut, EdgeView};
pub use geometry::{FetchMode, Point, PointList};
pub use meta::{GraphMeta, GRAPH_FORMAT_VERSION};
pub use options::{GraphBuilder, DEFAULT_ROOT_NAME};
pub use turn_cost::TurnCostEntry;
