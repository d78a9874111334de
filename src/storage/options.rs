use std::sync::Arc;

use crate::directory::{validate_segment_size, Directory, DEFAULT_SEGMENT_SIZE};
use crate::encoding::{EncodingRegistry, FlagWord};
use crate::types::{Result, StoreError};

use super::BaseGraph;

/// Default root name stores are derived from, e.g. `graph.nodes`.
pub const DEFAULT_ROOT_NAME: &str = "graph";

/// Configuration supplied when building a [`BaseGraph`].
#[derive(Clone)]
pub struct GraphBuilder {
    /// Backend holding the graph's stores
    pub dir: Arc<dyn Directory>,
    /// Property layout shared by every edge and turn cost
    pub registry: Arc<EncodingRegistry>,
    /// Prefix of every store name
    pub root_name: String,
    /// Segment size of every store, a power of two of at least 128 bytes
    pub segment_size: u32,
    /// Whether nodes and geometry carry elevation
    pub three_d: bool,
    /// Whether a turn-cost table exists
    pub turn_costs: bool,
}

impl GraphBuilder {
    /// Creates a builder for a 2-D graph without turn costs.
    pub fn new(dir: Arc<dyn Directory>, registry: Arc<EncodingRegistry>) -> Self {
        Self {
            dir,
            registry,
            root_name: DEFAULT_ROOT_NAME.to_owned(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            three_d: false,
            turn_costs: false,
        }
    }

    /// Sets the store name prefix.
    pub fn root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    /// Sets the segment size used by every store.
    pub fn segment_size(mut self, bytes: u32) -> Self {
        self.segment_size = bytes;
        self
    }

    /// Enables elevation on nodes and geometry.
    pub fn set_3d(mut self, enabled: bool) -> Self {
        self.three_d = enabled;
        self
    }

    /// Enables the turn-cost table.
    pub fn with_turn_costs(mut self, enabled: bool) -> Self {
        self.turn_costs = enabled;
        self
    }

    /// Validates the configuration and returns an uninitialised graph.
    pub fn build(self) -> Result<BaseGraph> {
        validate_segment_size(self.segment_size)?;
        if self.root_name.is_empty() || self.root_name.contains(['/', '\\']) {
            return Err(StoreError::Config(format!(
                "invalid graph root name {:?}",
                self.root_name
            )));
        }
        if self.turn_costs
            && !self
                .registry
                .values()
                .iter()
                .any(|v| v.word() == FlagWord::TurnCost)
        {
            return Err(StoreError::Config(
                "turn costs enabled but no turn-cost value is registered".into(),
            ));
        }
        Ok(BaseGraph::from_builder(self))
    }

    /// Builds and creates the graph with room for `expected_nodes` nodes.
    pub fn create(self, expected_nodes: u32) -> Result<BaseGraph> {
        let mut graph = self.build()?;
        graph.create(expected_nodes)?;
        Ok(graph)
    }
}
