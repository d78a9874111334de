use std::str::FromStr;

use super::value::EncodedValueSpec;
use crate::types::StoreError;

/// Data-driven description of one vehicle's properties.
///
/// A profile only decides which named values exist and how wide they are.
/// Access and priority rules that fill them in belong to the import pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleProfile {
    /// Vehicle name, used as the prefix of every value key.
    pub name: String,
    /// Width of the average speed slot.
    pub speed_bits: u32,
    /// Speed step per raw unit.
    pub speed_factor: f64,
    /// Whether speed is stored per direction.
    pub speed_two_directions: bool,
    /// Width of the priority code, or 0 for none.
    pub priority_bits: u32,
    /// Largest finite turn cost, or `None` when the vehicle has no turn costs.
    pub max_turn_costs: Option<u32>,
}

const DEFAULT_MAX_TURN_COSTS: u32 = 127;

impl VehicleProfile {
    fn base(name: &str, speed_bits: u32, speed_factor: f64) -> Self {
        Self {
            name: name.to_owned(),
            speed_bits,
            speed_factor,
            speed_two_directions: false,
            priority_bits: 0,
            max_turn_costs: None,
        }
    }

    /// Car with the given speed encoding; `max_turn_costs == 0` disables turn costs.
    pub fn car(speed_bits: u32, speed_factor: f64, max_turn_costs: u32) -> Self {
        Self {
            speed_two_directions: true,
            max_turn_costs: (max_turn_costs > 0).then_some(max_turn_costs),
            ..Self::base("car", speed_bits, speed_factor)
        }
    }

    /// Bike preset.
    pub fn bike() -> Self {
        Self {
            speed_two_directions: true,
            priority_bits: 4,
            ..Self::base("bike", 4, 2.0)
        }
    }

    /// Foot preset.
    pub fn foot() -> Self {
        Self {
            priority_bits: 4,
            ..Self::base("foot", 4, 1.0)
        }
    }

    /// Hike preset.
    pub fn hike() -> Self {
        Self {
            priority_bits: 4,
            ..Self::base("hike", 4, 1.0)
        }
    }

    /// Preset for a known vehicle name, or generic defaults for any other.
    pub fn preset(name: &str) -> Self {
        match name {
            "car" => Self::car(5, 5.0, 0),
            "bike" => Self::bike(),
            "foot" => Self::foot(),
            "hike" => Self::hike(),
            other => Self::base(other, 5, 5.0),
        }
    }

    /// Name of the access flag.
    pub fn access_key(&self) -> String {
        format!("{}_access", self.name)
    }

    /// Name of the average speed value.
    pub fn speed_key(&self) -> String {
        format!("{}_average_speed", self.name)
    }

    /// Name of the priority value.
    pub fn priority_key(&self) -> String {
        format!("{}_priority", self.name)
    }

    /// Name of the turn-cost value.
    pub fn turn_cost_key(&self) -> String {
        turn_cost_key(&self.name)
    }

    /// Values this profile registers, in placement order.
    pub fn value_specs(&self) -> Vec<EncodedValueSpec> {
        let mut specs = vec![
            EncodedValueSpec::boolean(self.access_key(), true),
            EncodedValueSpec::decimal(
                self.speed_key(),
                self.speed_bits,
                self.speed_factor,
                self.speed_two_directions,
            ),
        ];
        if self.priority_bits > 0 {
            specs.push(EncodedValueSpec::uint(
                self.priority_key(),
                self.priority_bits,
                false,
            ));
        }
        if let Some(max) = self.max_turn_costs {
            specs.push(EncodedValueSpec::turn_cost(self.turn_cost_key(), max));
        }
        specs
    }
}

/// Name of the turn-cost value registered for `vehicle`.
pub fn turn_cost_key(vehicle: &str) -> String {
    format!("{vehicle}_turn_cost")
}

fn parse_flag<T: FromStr>(key: &str, value: &str) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::Config(format!("invalid value {value:?} for {key}")))
}

/// Parses `name|key=value|...`, e.g. `car|speed_bits=5|speed_factor=5|max_turn_costs=1400`.
impl FromStr for VehicleProfile {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('|');
        let name = parts.next().unwrap_or("").trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(StoreError::Config(format!("invalid vehicle name {name:?}")));
        }
        let mut profile = Self::preset(name);
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| StoreError::Config(format!("expected key=value, got {part:?}")))?;
            let (key, value) = (key.trim(), value.trim());
            match key {
                "speed_bits" => profile.speed_bits = parse_flag(key, value)?,
                "speed_factor" => profile.speed_factor = parse_flag(key, value)?,
                "speed_two_directions" => profile.speed_two_directions = parse_flag(key, value)?,
                "priority_bits" => profile.priority_bits = parse_flag(key, value)?,
                "max_turn_costs" => {
                    let max: u32 = parse_flag(key, value)?;
                    profile.max_turn_costs = (max > 0).then_some(max);
                }
                "turn_costs" => {
                    let enabled: bool = parse_flag(key, value)?;
                    profile.max_turn_costs = match (enabled, profile.max_turn_costs) {
                        (false, _) => None,
                        (true, Some(max)) => Some(max),
                        (true, None) => Some(DEFAULT_MAX_TURN_COSTS),
                    };
                }
                other => {
                    return Err(StoreError::Config(format!(
                        "unknown vehicle option {other:?} for {name}"
                    )))
                }
            }
        }
        if profile.speed_bits == 0 || profile.speed_factor <= 0.0 {
            return Err(StoreError::Config(format!(
                "vehicle {name} needs positive speed bits and factor"
            )));
        }
        Ok(profile)
    }
}
