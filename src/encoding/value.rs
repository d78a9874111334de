use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{Result, StoreError};

/// Bits per storage int of a flag word.
pub const INT_BITS: u32 = 32;

/// Which shared flag word a value lives in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagWord {
    /// Per-edge flags.
    Edge,
    /// Per-turn-cost-record flags.
    TurnCost,
}

/// How raw bits translate to a value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueKind {
    /// One bit per direction.
    Bool,
    /// Unsigned integer in `[0, 2^bits)`.
    UInt,
    /// `raw * factor`; with `infinity` the largest raw value reads as +inf.
    Decimal {
        /// Value of one raw step.
        factor: f64,
        /// Whether the largest raw value is reserved for +inf.
        infinity: bool,
    },
}

/// A named property to be placed in a flag word.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedValueSpec {
    /// Name the value is registered under.
    pub name: String,
    /// Flag word the value is placed in.
    pub word: FlagWord,
    /// How raw bits decode.
    pub kind: ValueKind,
    /// Width of one direction slot.
    pub bits: u32,
    /// Reserve a second slot for the backward direction.
    pub two_directions: bool,
}

impl EncodedValueSpec {
    /// Boolean edge value.
    pub fn boolean(name: impl Into<String>, two_directions: bool) -> Self {
        Self {
            name: name.into(),
            word: FlagWord::Edge,
            kind: ValueKind::Bool,
            bits: 1,
            two_directions,
        }
    }

    /// Unsigned integer edge value of `bits` width.
    pub fn uint(name: impl Into<String>, bits: u32, two_directions: bool) -> Self {
        Self {
            name: name.into(),
            word: FlagWord::Edge,
            kind: ValueKind::UInt,
            bits,
            two_directions,
        }
    }

    /// Decimal edge value stored as multiples of `factor`.
    pub fn decimal(name: impl Into<String>, bits: u32, factor: f64, two_directions: bool) -> Self {
        Self {
            name: name.into(),
            word: FlagWord::Edge,
            kind: ValueKind::Decimal {
                factor,
                infinity: false,
            },
            bits,
            two_directions,
        }
    }

    /// Decimal turn-cost value able to hold `max` whole units plus +inf.
    pub fn turn_cost(name: impl Into<String>, max: u32) -> Self {
        Self {
            name: name.into(),
            word: FlagWord::TurnCost,
            kind: ValueKind::Decimal {
                factor: 1.0,
                infinity: true,
            },
            bits: bits_for(max.saturating_add(1)),
            two_directions: false,
        }
    }

    /// Moves the value into a different flag word.
    pub fn in_word(mut self, word: FlagWord) -> Self {
        self.word = word;
        self
    }

    /// Total bits this value occupies.
    pub fn width(&self) -> u32 {
        if self.two_directions {
            self.bits * 2
        } else {
            self.bits
        }
    }
}

/// Minimum number of bits able to represent `max`.
pub fn bits_for(max: u32) -> u32 {
    (INT_BITS - max.leading_zeros()).max(1)
}

/// A raw flag word: `ints` little-endian u32 slots.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Flags {
    ints: SmallVec<[u32; 4]>,
}

impl Flags {
    /// All-zero word of `ints` slots.
    pub fn zeroed(ints: usize) -> Self {
        Self {
            ints: SmallVec::from_elem(0, ints),
        }
    }

    /// Word holding a copy of `ints`.
    pub fn from_ints(ints: &[u32]) -> Self {
        Self {
            ints: SmallVec::from_slice(ints),
        }
    }

    /// The slots in order.
    pub fn ints(&self) -> &[u32] {
        &self.ints
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.ints.len()
    }

    /// Whether the word has no slots.
    pub fn is_empty(&self) -> bool {
        self.ints.is_empty()
    }

    /// Width of the word in bytes.
    pub fn byte_len(&self) -> usize {
        self.ints.len() * 4
    }

    /// Writes the slots into `dst` little-endian.
    pub fn encode_into(&self, dst: &mut [u8]) {
        for (chunk, v) in dst.chunks_exact_mut(4).zip(self.ints.iter()) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
    }

    /// Reads whole little-endian slots from `src`.
    pub fn decode(src: &[u8]) -> Self {
        let ints = src
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self { ints }
    }
}

/// Placement of one registered property inside its flag word.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedValue {
    pub(crate) registry: u64,
    pub(crate) name: String,
    pub(crate) word: FlagWord,
    pub(crate) kind: ValueKind,
    pub(crate) bits: u32,
    pub(crate) int_index: usize,
    pub(crate) shift: u32,
    pub(crate) two_directions: bool,
}

impl EncodedValue {
    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flag word holding the value.
    pub fn word(&self) -> FlagWord {
        self.word
    }

    /// Value kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Width of one direction slot.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Index of the int holding this value.
    pub fn int_index(&self) -> usize {
        self.int_index
    }

    /// Bit offset of the forward slot within its int.
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Whether the value has a backward slot.
    pub fn two_directions(&self) -> bool {
        self.two_directions
    }

    /// Largest raw value a slot can hold.
    pub fn max_raw(&self) -> u32 {
        if self.bits == INT_BITS {
            u32::MAX
        } else {
            (1u32 << self.bits) - 1
        }
    }

    fn slot_shift(&self, reverse: bool) -> u32 {
        if reverse && self.two_directions {
            self.shift + self.bits
        } else {
            self.shift
        }
    }

    fn slot_int(&self, flags: &Flags) -> Result<u32> {
        flags
            .ints
            .get(self.int_index)
            .copied()
            .ok_or(StoreError::Invalid("flag word narrower than encoded value"))
    }

    /// Raw bits of the forward (or, with `reverse`, backward) slot.
    pub fn get_raw(&self, flags: &Flags, reverse: bool) -> Result<u32> {
        let int = self.slot_int(flags)?;
        Ok((int >> self.slot_shift(reverse)) & self.max_raw())
    }

    /// Replaces the raw bits of one slot, leaving every other bit untouched.
    pub fn set_raw(&self, flags: &mut Flags, reverse: bool, raw: u32) -> Result<()> {
        if raw > self.max_raw() {
            return Err(StoreError::Invalid("raw value exceeds encoded value width"));
        }
        let int = self.slot_int(flags)?;
        let shift = self.slot_shift(reverse);
        let mask = self.max_raw() << shift;
        flags.ints[self.int_index] = (int & !mask) | (raw << shift);
        Ok(())
    }
}

/// Typed read/write of a registered property, used for edge and turn-cost flags.
pub trait FlagValue {
    /// Decoded value type.
    type Value;

    /// The placement this accessor reads and writes.
    fn encoded(&self) -> &EncodedValue;

    /// Decodes the value of one direction.
    fn read(&self, flags: &Flags, reverse: bool) -> Result<Self::Value>;

    /// Encodes `value` into one direction.
    fn write(&self, flags: &mut Flags, reverse: bool, value: Self::Value) -> Result<()>;
}

macro_rules! typed_value {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name(pub(crate) EncodedValue);

        impl $name {
            /// Registered name.
            pub fn name(&self) -> &str {
                self.0.name()
            }
        }
    };
}

typed_value!(BooleanValue, "Accessor for a boolean property.");
typed_value!(IntValue, "Accessor for an unsigned integer property.");
typed_value!(DecimalValue, "Accessor for a decimal property.");

impl FlagValue for BooleanValue {
    type Value = bool;

    fn encoded(&self) -> &EncodedValue {
        &self.0
    }

    fn read(&self, flags: &Flags, reverse: bool) -> Result<bool> {
        Ok(self.0.get_raw(flags, reverse)? != 0)
    }

    fn write(&self, flags: &mut Flags, reverse: bool, value: bool) -> Result<()> {
        self.0.set_raw(flags, reverse, u32::from(value))
    }
}

impl FlagValue for IntValue {
    type Value = u32;

    fn encoded(&self) -> &EncodedValue {
        &self.0
    }

    fn read(&self, flags: &Flags, reverse: bool) -> Result<u32> {
        self.0.get_raw(flags, reverse)
    }

    fn write(&self, flags: &mut Flags, reverse: bool, value: u32) -> Result<()> {
        self.0.set_raw(flags, reverse, value)
    }
}

impl DecimalValue {
    fn params(&self) -> (f64, bool) {
        match self.0.kind {
            ValueKind::Decimal { factor, infinity } => (factor, infinity),
            _ => (1.0, false),
        }
    }

    /// Largest finite value this accessor can store.
    pub fn max_finite(&self) -> f64 {
        let (factor, infinity) = self.params();
        let max = if infinity {
            self.0.max_raw() - 1
        } else {
            self.0.max_raw()
        };
        max as f64 * factor
    }

    fn to_raw(&self, value: f64) -> Result<u32> {
        let (factor, infinity) = self.params();
        if value.is_nan() || value < 0.0 {
            return Err(StoreError::Invalid("decimal value must be non-negative"));
        }
        if value.is_infinite() {
            if infinity {
                return Ok(self.0.max_raw());
            }
            return Err(StoreError::Invalid("encoded value cannot store infinity"));
        }
        let raw = (value / factor).round();
        let limit = if infinity {
            self.0.max_raw() - 1
        } else {
            self.0.max_raw()
        };
        if raw > limit as f64 {
            return Err(StoreError::Invalid("decimal value exceeds encoded range"));
        }
        Ok(raw as u32)
    }
}

impl FlagValue for DecimalValue {
    type Value = f64;

    fn encoded(&self) -> &EncodedValue {
        &self.0
    }

    fn read(&self, flags: &Flags, reverse: bool) -> Result<f64> {
        let (factor, infinity) = self.params();
        let raw = self.0.get_raw(flags, reverse)?;
        if infinity && raw == self.0.max_raw() {
            return Ok(f64::INFINITY);
        }
        Ok(raw as f64 * factor)
    }

    fn write(&self, flags: &mut Flags, reverse: bool, value: f64) -> Result<()> {
        let raw = self.to_raw(value)?;
        self.0.set_raw(flags, reverse, raw)
    }
}
