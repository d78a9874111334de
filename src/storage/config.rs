//! File-based graph configuration.
//!
//! ```toml
//! location = "/var/lib/routes/berlin"
//! backend = "mmap"
//! segment_size = 1048576
//! elevation = true
//! turn_costs = true
//! profiles = "car|max_turn_costs=1400,bike,foot"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use super::options::{GraphBuilder, DEFAULT_ROOT_NAME};
use crate::directory::{Directory, MmapDirectory, RamDirectory, StoreKind, DEFAULT_SEGMENT_SIZE};
use crate::encoding::{EncodingRegistry, DEFAULT_MAX_EDGE_BITS, DEFAULT_MAX_TURN_COST_BITS};
use crate::types::{Result, StoreError};

/// Graph settings read from a TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Folder holding the store files; required unless `backend = "ram"`.
    pub location: Option<PathBuf>,
    /// Store backend.
    pub backend: StoreKind,
    /// Prefix of every store name.
    pub root_name: String,
    /// Segment size of every store, a power of two.
    pub segment_size: u32,
    /// Store an elevation per node.
    pub elevation: bool,
    /// Create a turn-cost table.
    pub turn_costs: bool,
    /// Comma separated vehicle profiles, see [`crate::encoding::VehicleProfile`].
    pub profiles: String,
    /// Bit budget of the edge flag word.
    pub max_edge_bits: u32,
    /// Bit budget of the turn-cost flag word.
    pub max_turn_cost_bits: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            location: None,
            backend: StoreKind::Ram,
            root_name: DEFAULT_ROOT_NAME.to_owned(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            elevation: false,
            turn_costs: false,
            profiles: "car".to_owned(),
            max_edge_bits: DEFAULT_MAX_EDGE_BITS,
            max_turn_cost_bits: DEFAULT_MAX_TURN_COST_BITS,
        }
    }
}

impl GraphConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(format!("graph config: {e}")))
    }

    /// Reads and parses the TOML file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| StoreError::Config(format!("graph config {}: {e}", path.display())))
    }

    fn required_location(&self) -> Result<&Path> {
        self.location.as_deref().ok_or_else(|| {
            StoreError::Config(format!("backend {:?} needs a location", self.backend))
        })
    }

    /// Opens the configured backend.
    pub fn directory(&self) -> Result<Arc<dyn Directory>> {
        let dir: Arc<dyn Directory> = match self.backend {
            StoreKind::Ram => Arc::new(RamDirectory::new()),
            StoreKind::RamStore => Arc::new(RamDirectory::persistent(self.required_location()?)?),
            StoreKind::Mmap => Arc::new(MmapDirectory::new(self.required_location()?)?),
        };
        Ok(dir)
    }

    /// Registry holding every configured profile.
    pub fn registry(&self) -> Result<EncodingRegistry> {
        let mut builder = EncodingRegistry::builder()
            .max_edge_bits(self.max_edge_bits)
            .max_turn_cost_bits(self.max_turn_cost_bits);
        for item in self.profiles.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            builder = builder.add_profile(&item.parse()?);
        }
        builder.build()
    }

    /// Graph builder carrying every configured option.
    pub fn builder(&self) -> Result<GraphBuilder> {
        Ok(GraphBuilder::new(self.directory()?, Arc::new(self.registry()?))
            .root_name(self.root_name.clone())
            .segment_size(self.segment_size)
            .set_3d(self.elevation)
            .with_turn_costs(self.turn_costs))
    }
}
