//! Assignment of named vehicle properties to bit ranges in shared flag words.
//!
//! An [`EncodingRegistry`] is built once per graph, before any edge exists, and is
//! immutable afterwards. Every edge carries one edge flag word and every turn-cost
//! record one turn-cost flag word; the registry decides which bits belong to which
//! property. Its [`RegistrySignature`] is persisted with the graph so that a reload
//! with a different layout is rejected.

use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

mod profile;
mod value;

pub use profile::{turn_cost_key, VehicleProfile};
pub use value::{
    bits_for, BooleanValue, DecimalValue, EncodedValue, EncodedValueSpec, FlagValue, FlagWord,
    Flags, IntValue, ValueKind, INT_BITS,
};

use crate::types::{Result, StoreError};

/// Default upper bound for the edge flag word.
pub const DEFAULT_MAX_EDGE_BITS: u32 = 256;
/// Default upper bound for the turn-cost flag word.
pub const DEFAULT_MAX_TURN_COST_BITS: u32 = 64;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Immutable property layout shared by all edges and turn costs of a graph.
#[derive(Debug)]
pub struct EncodingRegistry {
    id: u64,
    values: Vec<EncodedValue>,
    by_name: FxHashMap<String, usize>,
    edge_ints: usize,
    turn_cost_ints: usize,
    vehicles: Vec<String>,
}

impl EncodingRegistry {
    /// Empty builder with the default bit budgets.
    pub fn builder() -> EncodingRegistryBuilder {
        EncodingRegistryBuilder::default()
    }

    /// Registry for a comma separated profile list such as `"car,hike"` or
    /// `"car|max_turn_costs=1400,foot"`.
    pub fn from_profiles(list: &str) -> Result<Self> {
        let mut builder = Self::builder();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            builder = builder.add_profile(&item.parse()?);
        }
        builder.build()
    }

    /// Process-unique identity, used to reject accessors from another registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of u32 slots in the edge flag word.
    pub fn edge_ints(&self) -> usize {
        self.edge_ints
    }

    /// Number of u32 slots in the turn-cost flag word.
    pub fn turn_cost_ints(&self) -> usize {
        self.turn_cost_ints
    }

    /// Vehicle names in registration order.
    pub fn vehicles(&self) -> &[String] {
        &self.vehicles
    }

    /// Whether a profile named `name` was registered.
    pub fn has_vehicle(&self, name: &str) -> bool {
        self.vehicles.iter().any(|v| v == name)
    }

    /// All values in placement order.
    pub fn values(&self) -> &[EncodedValue] {
        &self.values
    }

    /// Placement of the value `name`, if registered.
    pub fn lookup(&self, name: &str) -> Option<&EncodedValue> {
        self.by_name.get(name).map(|&idx| &self.values[idx])
    }

    fn typed(&self, name: &str, expect: fn(&ValueKind) -> bool) -> Result<EncodedValue> {
        let value = self
            .lookup(name)
            .ok_or_else(|| StoreError::NotFound(format!("encoded value {name}")))?;
        if !expect(&value.kind) {
            return Err(StoreError::Invalid("encoded value has a different kind"));
        }
        Ok(value.clone())
    }

    /// Boolean accessor for `name`.
    pub fn boolean(&self, name: &str) -> Result<BooleanValue> {
        self.typed(name, |k| matches!(k, ValueKind::Bool))
            .map(BooleanValue)
    }

    /// Integer accessor for `name`.
    pub fn uint(&self, name: &str) -> Result<IntValue> {
        self.typed(name, |k| matches!(k, ValueKind::UInt))
            .map(IntValue)
    }

    /// Decimal accessor for `name`.
    pub fn decimal(&self, name: &str) -> Result<DecimalValue> {
        self.typed(name, |k| matches!(k, ValueKind::Decimal { .. }))
            .map(DecimalValue)
    }

    /// Turn-cost accessor of `vehicle`.
    pub fn turn_cost(&self, vehicle: &str) -> Result<DecimalValue> {
        self.decimal(&turn_cost_key(vehicle))
    }

    /// Fresh all-zero word for `word`.
    pub fn empty_flags(&self, word: FlagWord) -> Flags {
        match word {
            FlagWord::Edge => Flags::zeroed(self.edge_ints),
            FlagWord::TurnCost => Flags::zeroed(self.turn_cost_ints),
        }
    }

    /// Fails unless `value` was issued by this registry for `word`.
    pub fn check_owned(&self, value: &EncodedValue, word: FlagWord) -> Result<()> {
        if value.registry != self.id {
            return Err(StoreError::Invalid(
                "encoded value belongs to another registry",
            ));
        }
        if value.word != word {
            return Err(StoreError::Invalid("encoded value targets another flag word"));
        }
        Ok(())
    }

    /// Stable description of the layout, persisted with the graph.
    pub fn signature(&self) -> RegistrySignature {
        RegistrySignature {
            edge_ints: self.edge_ints,
            turn_cost_ints: self.turn_cost_ints,
            values: self
                .values
                .iter()
                .map(|v| ValueSignature {
                    name: v.name.clone(),
                    word: v.word,
                    kind: v.kind,
                    bits: v.bits,
                    int_index: v.int_index,
                    shift: v.shift,
                    two_directions: v.two_directions,
                })
                .collect(),
        }
    }
}

/// Persisted form of one value placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueSignature {
    /// Registered value name.
    pub name: String,
    /// Flag word the value lives in.
    pub word: FlagWord,
    /// Value kind with its decoding parameters.
    pub kind: ValueKind,
    /// Width of one direction slot.
    pub bits: u32,
    /// Index of the int holding the value.
    pub int_index: usize,
    /// Bit offset of the forward slot.
    pub shift: u32,
    /// Whether a backward slot follows the forward one.
    pub two_directions: bool,
}

impl ValueSignature {
    /// First field in which `other` differs, phrased as stored vs configured.
    fn difference(&self, other: &ValueSignature) -> Option<String> {
        if self.name != other.name {
            return Some(format!(
                "stored value {} is configured as {}",
                self.name, other.name
            ));
        }
        let field = if self.word != other.word {
            format!("flag word {:?} vs {:?}", self.word, other.word)
        } else if self.kind != other.kind {
            format!("kind {:?} vs {:?}", self.kind, other.kind)
        } else if self.bits != other.bits {
            format!("bits {} vs {}", self.bits, other.bits)
        } else if self.int_index != other.int_index || self.shift != other.shift {
            format!(
                "position int {} bit {} vs int {} bit {}",
                self.int_index, self.shift, other.int_index, other.shift
            )
        } else if self.two_directions != other.two_directions {
            format!(
                "two directions {} vs {}",
                self.two_directions, other.two_directions
            )
        } else {
            return None;
        };
        Some(format!("value {}: {field}", self.name))
    }
}

/// Persisted form of a whole registry layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrySignature {
    /// Number of u32 slots in the edge flag word.
    pub edge_ints: usize,
    /// Number of u32 slots in the turn-cost flag word.
    pub turn_cost_ints: usize,
    /// Placements in registration order.
    pub values: Vec<ValueSignature>,
}

impl RegistrySignature {
    /// Human readable reason why the configured layout `other` differs from this
    /// stored one, or `None` when identical.
    pub fn difference(&self, other: &RegistrySignature) -> Option<String> {
        if self == other {
            return None;
        }
        if self.edge_ints != other.edge_ints || self.turn_cost_ints != other.turn_cost_ints {
            return Some(format!(
                "flag word width {}+{} ints vs {}+{} ints",
                self.edge_ints, self.turn_cost_ints, other.edge_ints, other.turn_cost_ints
            ));
        }
        for (ours, theirs) in self.values.iter().zip(other.values.iter()) {
            if let Some(diff) = ours.difference(theirs) {
                return Some(diff);
            }
        }
        Some(format!(
            "{} values vs {} values",
            self.values.len(),
            other.values.len()
        ))
    }
}

/// Collects value specs, then places them.
#[derive(Clone, Debug)]
pub struct EncodingRegistryBuilder {
    specs: Vec<EncodedValueSpec>,
    vehicles: Vec<String>,
    max_edge_bits: u32,
    max_turn_cost_bits: u32,
}

impl Default for EncodingRegistryBuilder {
    fn default() -> Self {
        Self {
            specs: Vec::new(),
            vehicles: Vec::new(),
            max_edge_bits: DEFAULT_MAX_EDGE_BITS,
            max_turn_cost_bits: DEFAULT_MAX_TURN_COST_BITS,
        }
    }
}

impl EncodingRegistryBuilder {
    /// Caps the edge flag word at `bits` bits.
    pub fn max_edge_bits(mut self, bits: u32) -> Self {
        self.max_edge_bits = bits;
        self
    }

    /// Caps the turn-cost flag word at `bits` bits.
    pub fn max_turn_cost_bits(mut self, bits: u32) -> Self {
        self.max_turn_cost_bits = bits;
        self
    }

    /// Registers one value.
    pub fn add(mut self, spec: EncodedValueSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Registers a vehicle and every value its profile declares.
    pub fn add_profile(mut self, profile: &VehicleProfile) -> Self {
        self.vehicles.push(profile.name.clone());
        self.specs.extend(profile.value_specs());
        self
    }

    /// Places every value, failing with `Config` when a name repeats or a budget is exceeded.
    pub fn build(self) -> Result<EncodingRegistry> {
        let id = NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed);
        let mut values = Vec::with_capacity(self.specs.len());
        let mut by_name = FxHashMap::default();
        // (int index, next free bit) per flag word
        let mut edge_cursor = (0usize, 0u32);
        let mut turn_cursor = (0usize, 0u32);
        for spec in self.specs {
            if spec.name.is_empty() {
                return Err(StoreError::Config("encoded value without a name".into()));
            }
            if spec.bits == 0 || spec.width() > INT_BITS {
                return Err(StoreError::Config(format!(
                    "encoded value {} needs {} bits, must be within 1..={INT_BITS}",
                    spec.name,
                    spec.width()
                )));
            }
            if let ValueKind::Decimal { factor, .. } = spec.kind {
                if !(factor.is_finite() && factor > 0.0) {
                    return Err(StoreError::Config(format!(
                        "encoded value {} has a non-positive factor",
                        spec.name
                    )));
                }
            }
            if by_name.contains_key(&spec.name) {
                return Err(StoreError::Config(format!(
                    "encoded value {} registered twice",
                    spec.name
                )));
            }
            let cursor = match spec.word {
                FlagWord::Edge => &mut edge_cursor,
                FlagWord::TurnCost => &mut turn_cursor,
            };
            if cursor.1 + spec.width() > INT_BITS {
                cursor.0 += 1;
                cursor.1 = 0;
            }
            let (int_index, shift) = *cursor;
            cursor.1 += spec.width();
            by_name.insert(spec.name.clone(), values.len());
            values.push(EncodedValue {
                registry: id,
                name: spec.name,
                word: spec.word,
                kind: spec.kind,
                bits: spec.bits,
                int_index,
                shift,
                two_directions: spec.two_directions,
            });
        }
        let edge_ints = edge_cursor.0 + 1;
        let turn_cost_ints = turn_cursor.0 + 1;
        if edge_ints as u32 * INT_BITS > self.max_edge_bits {
            return Err(StoreError::Config(format!(
                "edge flags need {} bits but at most {} are allowed",
                edge_ints as u32 * INT_BITS,
                self.max_edge_bits
            )));
        }
        if turn_cost_ints as u32 * INT_BITS > self.max_turn_cost_bits {
            return Err(StoreError::Config(format!(
                "turn cost flags need {} bits but at most {} are allowed",
                turn_cost_ints as u32 * INT_BITS,
                self.max_turn_cost_bits
            )));
        }
        Ok(EncodingRegistry {
            id,
            values,
            by_name,
            edge_ints,
            turn_cost_ints,
            vehicles: self.vehicles,
        })
    }
}
