use serde::{Deserialize, Serialize};

/// Operating mode of the thermostat. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Off,
    Auto,
    Manual,
    Heat,
    Cool,
    Fan,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Self::Off,
        Self::Auto,
        Self::Manual,
        Self::Heat,
        Self::Cool,
        Self::Fan,
    ];

    /// Next mode in the local selection cycle, wrapping from FAN back to OFF.
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Auto,
            Self::Auto => Self::Manual,
            Self::Manual => Self::Heat,
            Self::Heat => Self::Cool,
            Self::Cool => Self::Fan,
            Self::Fan => Self::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Fan => "fan",
        }
    }

    /// Projection onto the hub's thermostat modes. The hub has no manual
    /// concept, so MANUAL is reported as "off" while the switch entities
    /// carry the real device state.
    pub fn hub_mode(self) -> &'static str {
        match self {
            Self::Off | Self::Manual => "off",
            Self::Auto => "auto",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Fan => "fan_only",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.trim().to_ascii_lowercase();
        match lower.as_str() {
            "off" => Some(Self::Off),
            "auto" => Some(Self::Auto),
            "manual" | "man" => Some(Self::Manual),
            "heat" => Some(Self::Heat),
            "cool" => Some(Self::Cool),
            "fan" | "fan_only" => Some(Self::Fan),
            _ => None,
        }
    }
}

/// The three physical actuators driven by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Heat,
    Cool,
    Fan,
}

impl Device {
    pub const ALL: [Device; 3] = [Self::Heat, Self::Cool, Self::Fan];

    pub fn index(self) -> usize {
        match self {
            Self::Heat => 0,
            Self::Cool => 1,
            Self::Fan => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Fan => "fan",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "heat" | "heater" => Some(Self::Heat),
            "cool" | "ac" => Some(Self::Cool),
            "fan" => Some(Self::Fan),
            _ => None,
        }
    }
}

/// One boolean per actuator. Used for requested, actual and pending sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorSet {
    pub heat: bool,
    pub cool: bool,
    pub fan: bool,
}

impl ActuatorSet {
    pub const OFF: ActuatorSet = ActuatorSet {
        heat: false,
        cool: false,
        fan: false,
    };

    /// Set with exactly one device on.
    pub fn only(device: Device) -> Self {
        let mut set = Self::OFF;
        set.set(device, true);
        set
    }

    pub fn get(&self, device: Device) -> bool {
        match device {
            Device::Heat => self.heat,
            Device::Cool => self.cool,
            Device::Fan => self.fan,
        }
    }

    pub fn set(&mut self, device: Device, on: bool) {
        match device {
            Device::Heat => self.heat = on,
            Device::Cool => self.cool = on,
            Device::Fan => self.fan = on,
        }
    }

    pub fn active_count(&self) -> usize {
        Device::ALL.iter().filter(|device| self.get(**device)).count()
    }

    pub fn any(&self) -> bool {
        self.heat || self.cool || self.fan
    }
}

/// What the equipment is physically doing, as reported to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacAction {
    Idle,
    Heating,
    Cooling,
    Fan,
}

impl HvacAction {
    pub fn from_actual(actual: &ActuatorSet) -> Self {
        if actual.heat {
            Self::Heating
        } else if actual.cool {
            Self::Cooling
        } else if actual.fan {
            Self::Fan
        } else {
            Self::Idle
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::Fan => "fan",
        }
    }
}

/// Unit used for display only. All comparisons happen in Fahrenheit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    Celsius,
}

impl TemperatureUnit {
    pub fn convert_from_fahrenheit(self, temp_f: f32) -> f32 {
        match self {
            Self::Fahrenheit => temp_f,
            Self::Celsius => fahrenheit_to_celsius(temp_f),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Fahrenheit => "F",
            Self::Celsius => "C",
        }
    }
}

pub fn celsius_to_fahrenheit(temp_c: f32) -> f32 {
    temp_c * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(temp_f: f32) -> f32 {
    (temp_f - 32.0) * 5.0 / 9.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    pub target_f: f32,
    pub display_unit: TemperatureUnit,
}

impl Setpoint {
    pub fn display_value(&self) -> f32 {
        self.display_unit.convert_from_fahrenheit(self.target_f)
    }
}

/// Relative humidity a working sensor can report.
pub const HUMIDITY_RANGE: std::ops::RangeInclusive<f32> = 0.0..=100.0;

/// A single sample from the reading source. Superseded, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temperature_f: f32,
    pub humidity: f32,
    pub taken_at_ms: u64,
    pub valid: bool,
}

impl Reading {
    pub fn new(temperature_f: f32, humidity: f32, taken_at_ms: u64) -> Self {
        Self {
            temperature_f,
            humidity,
            taken_at_ms,
            valid: temperature_f.is_finite() && HUMIDITY_RANGE.contains(&humidity),
        }
    }

    pub fn from_celsius(temperature_c: f32, humidity: f32, taken_at_ms: u64) -> Self {
        Self::new(celsius_to_fahrenheit(temperature_c), humidity, taken_at_ms)
    }

    /// Placeholder produced when the sensor failed to deliver a sample.
    pub fn invalid(taken_at_ms: u64) -> Self {
        Self {
            temperature_f: f32::NAN,
            humidity: f32::NAN,
            taken_at_ms,
            valid: false,
        }
    }
}
