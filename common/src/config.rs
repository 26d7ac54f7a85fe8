use serde::{Deserialize, Serialize};

use crate::types::TemperatureUnit;

/// What the engine does in AUTO when the input is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    #[default]
    HoldDecision,
    ForceOff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub min_cycle_ms: u64,
    pub cold_tolerance_f: f32,
    pub heat_tolerance_f: f32,
    pub min_target_f: f32,
    pub max_target_f: f32,
    pub initial_target_f: f32,
    pub min_valid_temp_f: f32,
    pub max_valid_temp_f: f32,
    pub fan_with_conditioning: bool,
    pub stale_policy: StalePolicy,
    pub sensor_stale_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub cycle_interval_ms: u64,
    pub sensor_timeout_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            min_cycle_ms: 300_000,
            cold_tolerance_f: 1.0,
            heat_tolerance_f: 1.0,
            min_target_f: 60.0,
            max_target_f: 84.0,
            initial_target_f: 70.0,
            min_valid_temp_f: -40.0,
            max_valid_temp_f: 150.0,
            fan_with_conditioning: false,
            stale_policy: StalePolicy::HoldDecision,
            sensor_stale_timeout_ms: 300_000,
            poll_interval_ms: 20_000,
            cycle_interval_ms: 1_000,
            sensor_timeout_ms: 2_000,
        }
    }
}

impl ControlConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        self.min_cycle_ms = self.min_cycle_ms.min(3_600_000);
        self.cold_tolerance_f = sanitize_f32(self.cold_tolerance_f, defaults.cold_tolerance_f)
            .clamp(0.1, 10.0);
        self.heat_tolerance_f = sanitize_f32(self.heat_tolerance_f, defaults.heat_tolerance_f)
            .clamp(0.1, 10.0);

        self.min_target_f =
            sanitize_f32(self.min_target_f, defaults.min_target_f).clamp(40.0, 95.0);
        self.max_target_f =
            sanitize_f32(self.max_target_f, defaults.max_target_f).clamp(40.0, 95.0);
        if self.min_target_f >= self.max_target_f {
            self.min_target_f = defaults.min_target_f;
            self.max_target_f = defaults.max_target_f;
        }
        self.initial_target_f = sanitize_f32(self.initial_target_f, defaults.initial_target_f)
            .clamp(self.min_target_f, self.max_target_f);

        if !self.min_valid_temp_f.is_finite()
            || !self.max_valid_temp_f.is_finite()
            || self.min_valid_temp_f >= self.max_valid_temp_f
        {
            self.min_valid_temp_f = defaults.min_valid_temp_f;
            self.max_valid_temp_f = defaults.max_valid_temp_f;
        }

        self.poll_interval_ms = self.poll_interval_ms.clamp(1_000, 600_000);
        self.cycle_interval_ms = self.cycle_interval_ms.clamp(100, self.poll_interval_ms);
        self.sensor_timeout_ms = self.sensor_timeout_ms.clamp(100, 30_000);
        self.sensor_stale_timeout_ms = self.sensor_stale_timeout_ms.max(self.poll_interval_ms);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub unit: TemperatureUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub base_topic: String,
    pub discovery_prefix: String,
    pub node_id: String,
    pub device_name: String,
    pub manufacturer: String,
    pub model: String,
    pub heartbeat_interval_ms: u64,
    pub master_off_topic: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_topic: "climate".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            node_id: "climate-controller".to_string(),
            device_name: "Climate Controller".to_string(),
            manufacturer: "DIY".to_string(),
            model: "Relay Thermostat".to_string(),
            heartbeat_interval_ms: 60_000,
            master_off_topic: None,
        }
    }
}

impl BridgeConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        let base = self.base_topic.trim().trim_end_matches('/');
        self.base_topic = if base.is_empty() {
            defaults.base_topic
        } else {
            base.to_string()
        };

        let prefix = self.discovery_prefix.trim().trim_end_matches('/');
        self.discovery_prefix = if prefix.is_empty() {
            defaults.discovery_prefix
        } else {
            prefix.to_string()
        };

        if self.node_id.trim().is_empty() || self.node_id.contains('/') {
            self.node_id = defaults.node_id;
        }
        if self
            .master_off_topic
            .as_deref()
            .is_some_and(|topic| topic.trim().is_empty())
        {
            self.master_off_topic = None;
        }
        self.heartbeat_interval_ms = self.heartbeat_interval_ms.max(5_000);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub heat_topic: String,
    pub cool_topic: String,
    pub fan_topic: String,
    pub payload_on: String,
    pub payload_off: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heat_topic: "climate/relay/heat".to_string(),
            cool_topic: "climate/relay/cool".to_string(),
            fan_topic: "climate/relay/fan".to_string(),
            payload_on: "ON".to_string(),
            payload_off: "OFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub publish_timeout_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "climate-controller".to_string(),
            keep_alive_secs: 30,
            publish_timeout_ms: 2_000,
            reconnect_initial_ms: 1_000,
            reconnect_max_ms: 60_000,
        }
    }
}

impl NetworkConfig {
    pub fn sanitize(&mut self) {
        if self.mqtt_port == 0 {
            self.mqtt_port = 1883;
        }
        self.keep_alive_secs = self.keep_alive_secs.clamp(5, 600);
        self.publish_timeout_ms = self.publish_timeout_ms.clamp(100, 30_000);
        self.reconnect_initial_ms = self.reconnect_initial_ms.clamp(100, 60_000);
        self.reconnect_max_ms = self.reconnect_max_ms.max(self.reconnect_initial_ms);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub control: ControlConfig,
    pub display: DisplayConfig,
    pub bridge: BridgeConfig,
    pub relays: RelayConfig,
    pub network: NetworkConfig,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            display: DisplayConfig::default(),
            bridge: BridgeConfig::default(),
            relays: RelayConfig::default(),
            network: NetworkConfig::default(),
            http_port: 8080,
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.control.sanitize();
        self.bridge.sanitize();
        self.network.sanitize();
    }
}

fn sanitize_f32(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
