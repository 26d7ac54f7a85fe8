use serde::Serialize;

use crate::{
    config::{BridgeConfig, ControlConfig},
    topics::{Topics, PAYLOAD_OFF, PAYLOAD_OFFLINE, PAYLOAD_ON, PAYLOAD_ONLINE},
    types::Mode,
};

/// Device block shared by every entity so the hub groups them together.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

/// Entity configuration payload, following the hub's MQTT discovery schema.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntityConfig {
    pub name: String,
    pub unique_id: String,
    pub device: DeviceInfo,
    pub availability_topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_temperature_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_temperature_template: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_state_template: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_template: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modes: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_temp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_temp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_step: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f32>,
}

impl EntityConfig {
    fn base(name: String, unique_id: String, device: &DeviceInfo, topics: &Topics) -> Self {
        Self {
            name,
            unique_id,
            device: device.clone(),
            availability_topic: topics.status.clone(),
            payload_available: PAYLOAD_ONLINE,
            payload_not_available: PAYLOAD_OFFLINE,
            state_topic: None,
            command_topic: None,
            value_template: None,
            device_class: None,
            unit_of_measurement: None,
            state_class: None,
            icon: None,
            payload_on: None,
            payload_off: None,
            current_temperature_topic: None,
            current_temperature_template: None,
            temperature_command_topic: None,
            temperature_state_topic: None,
            mode_command_topic: None,
            mode_state_topic: None,
            mode_state_template: None,
            action_topic: None,
            action_template: None,
            modes: None,
            min_temp: None,
            max_temp: None,
            temp_step: None,
            temperature_unit: None,
            precision: None,
        }
    }
}

/// One retained announcement: where it goes and what it says.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryEntity {
    pub component: &'static str,
    pub object_id: &'static str,
    pub topic: String,
    pub payload: String,
}

/// Static description of the device and its entities. Built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRecord {
    entities: Vec<DiscoveryEntity>,
}

impl DiscoveryRecord {
    pub fn new(
        bridge: &BridgeConfig,
        control: &ControlConfig,
        topics: &Topics,
    ) -> Result<Self, serde_json::Error> {
        let device = DeviceInfo {
            identifiers: vec![bridge.node_id.clone()],
            name: bridge.device_name.clone(),
            manufacturer: bridge.manufacturer.clone(),
            model: bridge.model.clone(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let node = bridge.node_id.as_str();
        let named = |suffix: &str| format!("{} {suffix}", bridge.device_name);

        let mut temperature = EntityConfig::base(
            named("Temperature"),
            format!("{node}_temperature"),
            &device,
            topics,
        );
        temperature.state_topic = Some(topics.temperature_state.clone());
        temperature.value_template = Some("{{ value | float }}");
        temperature.device_class = Some("temperature");
        temperature.unit_of_measurement = Some("°F");
        temperature.state_class = Some("measurement");

        let mut humidity =
            EntityConfig::base(named("Humidity"), format!("{node}_humidity"), &device, topics);
        humidity.state_topic = Some(topics.humidity_state.clone());
        humidity.value_template = Some("{{ value | float }}");
        humidity.device_class = Some("humidity");
        humidity.unit_of_measurement = Some("%");
        humidity.state_class = Some("measurement");

        let mut climate = EntityConfig::base(
            named("Thermostat"),
            format!("{node}_thermostat"),
            &device,
            topics,
        );
        climate.current_temperature_topic = Some(topics.temperature_state.clone());
        climate.current_temperature_template = Some("{{ value | float }}");
        climate.temperature_command_topic = Some(topics.setpoint_set.clone());
        climate.temperature_state_topic = Some(topics.setpoint_state.clone());
        climate.mode_command_topic = Some(topics.mode_set.clone());
        climate.mode_state_topic = Some(topics.mode_state.clone());
        climate.mode_state_template = Some("{{ value }}");
        climate.action_topic = Some(topics.climate_state.clone());
        climate.action_template = Some("{{ value_json.action }}");
        climate.modes = Some(hub_modes());
        climate.min_temp = Some(control.min_target_f);
        climate.max_temp = Some(control.max_target_f);
        climate.temp_step = Some(0.5);
        climate.temperature_unit = Some("F");
        climate.precision = Some(0.1);

        let mut heater =
            EntityConfig::base(named("Heater"), format!("{node}_heat"), &device, topics);
        heater.state_topic = Some(topics.heat_state.clone());
        heater.command_topic = Some(topics.heat_set.clone());
        heater.value_template = Some("{{ value }}");
        heater.payload_on = Some(PAYLOAD_ON);
        heater.payload_off = Some(PAYLOAD_OFF);
        heater.icon = Some("mdi:radiator");

        let mut cooler =
            EntityConfig::base(named("AC"), format!("{node}_cool"), &device, topics);
        cooler.state_topic = Some(topics.cool_state.clone());
        cooler.command_topic = Some(topics.cool_set.clone());
        cooler.value_template = Some("{{ value }}");
        cooler.payload_on = Some(PAYLOAD_ON);
        cooler.payload_off = Some(PAYLOAD_OFF);
        cooler.icon = Some("mdi:snowflake");

        let prefix = bridge.discovery_prefix.as_str();
        let entries = [
            ("sensor", "temperature", temperature),
            ("sensor", "humidity", humidity),
            ("climate", "thermostat", climate),
            ("switch", "heat", heater),
            ("switch", "cool", cooler),
        ];

        let mut entities = Vec::with_capacity(entries.len());
        for (component, object_id, config) in entries {
            entities.push(DiscoveryEntity {
                component,
                object_id,
                topic: format!("{prefix}/{component}/{node}/{object_id}/config"),
                payload: serde_json::to_string(&config)?,
            });
        }

        Ok(Self { entities })
    }

    pub fn entities(&self) -> &[DiscoveryEntity] {
        &self.entities
    }
}

fn hub_modes() -> Vec<&'static str> {
    let mut modes: Vec<&'static str> = Vec::new();
    for mode in Mode::ALL {
        let projected = mode.hub_mode();
        if !modes.contains(&projected) {
            modes.push(projected);
        }
    }
    modes
}
