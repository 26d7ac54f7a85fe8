use crate::{config::BridgeConfig, types::Device};

pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";
pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";

/// Concrete topic names derived from the configured base prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub temperature_state: String,
    pub humidity_state: String,
    pub climate_state: String,
    pub setpoint_state: String,
    pub setpoint_set: String,
    pub mode_state: String,
    pub mode_set: String,
    pub heat_state: String,
    pub heat_set: String,
    pub cool_state: String,
    pub cool_set: String,
    pub status: String,
    pub discovery_request: String,
    pub hub_status: String,
    pub master_off: Option<String>,
}

impl Topics {
    pub fn new(config: &BridgeConfig) -> Self {
        let base = config.base_topic.as_str();
        Self {
            temperature_state: format!("{base}/sensor/temperature/state"),
            humidity_state: format!("{base}/sensor/humidity/state"),
            climate_state: format!("{base}/climate/state"),
            setpoint_state: format!("{base}/climate/setpoint/state"),
            setpoint_set: format!("{base}/climate/setpoint/set"),
            mode_state: format!("{base}/climate/mode/state"),
            mode_set: format!("{base}/climate/mode/set"),
            heat_state: format!("{base}/switch/heat/state"),
            heat_set: format!("{base}/switch/heat/set"),
            cool_state: format!("{base}/switch/cool/state"),
            cool_set: format!("{base}/switch/cool/set"),
            status: format!("{base}/status"),
            discovery_request: format!("{base}/discovery"),
            hub_status: format!("{}/status", config.discovery_prefix),
            master_off: config.master_off_topic.clone(),
        }
    }

    /// Every topic the bridge needs to receive.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics = vec![
            self.setpoint_set.clone(),
            self.mode_set.clone(),
            self.heat_set.clone(),
            self.cool_set.clone(),
            self.discovery_request.clone(),
            self.hub_status.clone(),
        ];
        if let Some(master) = &self.master_off {
            topics.push(master.clone());
        }
        topics
    }

    pub fn switch_state(&self, device: Device) -> Option<&str> {
        match device {
            Device::Heat => Some(&self.heat_state),
            Device::Cool => Some(&self.cool_state),
            Device::Fan => None,
        }
    }

    pub fn switch_set(&self, device: Device) -> Option<&str> {
        match device {
            Device::Heat => Some(&self.heat_set),
            Device::Cool => Some(&self.cool_set),
            Device::Fan => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_base_prefix() {
        let topics = Topics::new(&BridgeConfig {
            base_topic: "house/hvac".to_string(),
            ..BridgeConfig::default()
        });

        assert_eq!(topics.mode_set, "house/hvac/climate/mode/set");
        assert_eq!(topics.status, "house/hvac/status");
        assert_eq!(topics.hub_status, "homeassistant/status");
        assert_eq!(topics.switch_state(Device::Cool), Some("house/hvac/switch/cool/state"));
        assert_eq!(topics.switch_set(Device::Fan), None);
    }

    #[test]
    fn master_off_topic_is_subscribed_when_configured() {
        let mut config = BridgeConfig::default();
        assert_eq!(Topics::new(&config).subscriptions().len(), 6);

        config.master_off_topic = Some("house/master/state".to_string());
        let subscriptions = Topics::new(&config).subscriptions();
        assert!(subscriptions.contains(&"house/master/state".to_string()));
    }
}
