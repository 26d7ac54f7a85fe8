use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::{
    commands::Command,
    config::{BridgeConfig, ControlConfig},
    discovery::DiscoveryRecord,
    error::CommandError,
    topics::{Topics, PAYLOAD_OFF, PAYLOAD_OFFLINE, PAYLOAD_ON, PAYLOAD_ONLINE},
    types::{ActuatorSet, Device, HvacAction, Mode, Reading},
};

pub const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl OutboundMessage {
    fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }
}

/// Observable controller state the bridge mirrors to the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub mode: Mode,
    pub target_f: f32,
    pub reading: Option<Reading>,
    pub actual: ActuatorSet,
    pub pending: ActuatorSet,
    pub stale: bool,
}

#[derive(Debug, Serialize)]
struct ClimateStatePayload {
    action: &'static str,
    mode: &'static str,
    stale: bool,
    pending: bool,
}

/// Translates controller state into retained topic updates and inbound
/// payloads into commands.
///
/// The only state kept is what was last published, so each observable change
/// goes out at most once, plus the connection flag.
#[derive(Debug, Clone)]
pub struct StateSyncBridge {
    topics: Topics,
    discovery: DiscoveryRecord,
    min_target_f: f32,
    max_target_f: f32,
    heartbeat_interval_ms: u64,

    connected: bool,
    published: HashMap<String, String>,
    last_heartbeat_ms: Option<u64>,
}

impl StateSyncBridge {
    pub fn new(bridge: &BridgeConfig, control: &ControlConfig) -> Result<Self, serde_json::Error> {
        let topics = Topics::new(bridge);
        let discovery = DiscoveryRecord::new(bridge, control, &topics)?;
        Ok(Self {
            topics,
            discovery,
            min_target_f: control.min_target_f,
            max_target_f: control.max_target_f,
            heartbeat_interval_ms: bridge.heartbeat_interval_ms,
            connected: false,
            published: HashMap::new(),
            last_heartbeat_ms: None,
        })
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Retained availability value the broker publishes if we vanish.
    pub fn last_will(&self) -> OutboundMessage {
        OutboundMessage::retained(self.topics.status.clone(), PAYLOAD_OFFLINE)
    }

    /// Full resync after a (re)connection: availability, discovery, state.
    pub fn on_connected(&mut self, snapshot: &StateSnapshot, now_ms: u64) -> Vec<OutboundMessage> {
        self.connected = true;
        self.full_sync(snapshot, now_ms)
    }

    pub fn on_disconnected(&mut self) {
        self.connected = false;
    }

    /// Re-announce on request from the hub. No-op while disconnected.
    pub fn announce(&mut self, snapshot: &StateSnapshot, now_ms: u64) -> Vec<OutboundMessage> {
        if !self.connected {
            return Vec::new();
        }
        self.full_sync(snapshot, now_ms)
    }

    /// Messages for whatever changed since the last publish.
    ///
    /// Nothing is queued while disconnected; the next `on_connected` sends the
    /// state as it is then.
    pub fn sync(&mut self, snapshot: &StateSnapshot, now_ms: u64) -> Vec<OutboundMessage> {
        if !self.connected {
            return Vec::new();
        }

        let mut messages = Vec::new();
        for (topic, payload) in self.render_state(snapshot) {
            if self.published.get(&topic) == Some(&payload) {
                continue;
            }
            self.published.insert(topic.clone(), payload.clone());
            messages.push(OutboundMessage::retained(topic, payload));
        }

        let heartbeat_due = self
            .last_heartbeat_ms
            .map(|last| now_ms.saturating_sub(last) >= self.heartbeat_interval_ms)
            .unwrap_or(true);
        if heartbeat_due {
            self.last_heartbeat_ms = Some(now_ms);
            messages.push(OutboundMessage::retained(
                self.topics.status.clone(),
                PAYLOAD_ONLINE,
            ));
        }

        messages
    }

    /// Final availability message for an orderly shutdown.
    pub fn goodbye(&mut self) -> Vec<OutboundMessage> {
        if !self.connected {
            return Vec::new();
        }
        vec![self.last_will()]
    }

    /// Validate an inbound payload. `Ok(None)` means the message was well
    /// formed but asks for nothing.
    pub fn parse_inbound(&self, topic: &str, payload: &[u8]) -> Result<Option<Command>, CommandError> {
        if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
            return Err(CommandError::Oversized { len: payload.len() });
        }
        let message = std::str::from_utf8(payload).map_err(|_| CommandError::NotUtf8)?;
        let value = message.trim();
        let malformed = || CommandError::Malformed {
            topic: topic.to_string(),
            payload: value.to_string(),
        };

        if topic == self.topics.setpoint_set {
            let target: f32 = value.parse().map_err(|_| malformed())?;
            if !target.is_finite() {
                return Err(malformed());
            }
            if !(self.min_target_f..=self.max_target_f).contains(&target) {
                return Err(CommandError::OutOfRange {
                    value: target,
                    min: self.min_target_f,
                    max: self.max_target_f,
                });
            }
            return Ok(Some(Command::SetTarget(target)));
        }

        if topic == self.topics.mode_set {
            return Mode::parse(value)
                .map(|mode| Some(Command::SetMode(mode)))
                .ok_or_else(malformed);
        }

        for device in [Device::Heat, Device::Cool] {
            if self.topics.switch_set(device) == Some(topic) {
                let on = parse_switch(value).ok_or_else(malformed)?;
                return Ok(Some(Command::Switch { device, on }));
            }
        }

        if topic == self.topics.discovery_request {
            return Ok(Some(Command::Announce));
        }

        if topic == self.topics.hub_status {
            return Ok(value
                .eq_ignore_ascii_case(PAYLOAD_ONLINE)
                .then_some(Command::Announce));
        }

        if self.topics.master_off.as_deref() == Some(topic) {
            return Ok(Some(Command::MasterOff));
        }

        Err(CommandError::UnknownTopic(topic.to_string()))
    }

    fn full_sync(&mut self, snapshot: &StateSnapshot, now_ms: u64) -> Vec<OutboundMessage> {
        let mut messages = vec![OutboundMessage::retained(
            self.topics.status.clone(),
            PAYLOAD_ONLINE,
        )];

        for entity in self.discovery.entities() {
            messages.push(OutboundMessage::retained(
                entity.topic.clone(),
                entity.payload.clone(),
            ));
        }

        self.published.clear();
        for (topic, payload) in self.render_state(snapshot) {
            self.published.insert(topic.clone(), payload.clone());
            messages.push(OutboundMessage::retained(topic, payload));
        }

        self.last_heartbeat_ms = Some(now_ms);
        messages
    }

    fn render_state(&self, snapshot: &StateSnapshot) -> Vec<(String, String)> {
        let mut state = Vec::with_capacity(7);

        if let Some(reading) = &snapshot.reading {
            state.push((
                self.topics.temperature_state.clone(),
                format!("{:.1}", reading.temperature_f),
            ));
            state.push((
                self.topics.humidity_state.clone(),
                format!("{:.1}", reading.humidity),
            ));
        }

        let climate = ClimateStatePayload {
            action: HvacAction::from_actual(&snapshot.actual).as_str(),
            mode: snapshot.mode.as_str(),
            stale: snapshot.stale,
            pending: snapshot.pending.any(),
        };
        match serde_json::to_string(&climate) {
            Ok(body) => state.push((self.topics.climate_state.clone(), body)),
            Err(err) => warn!("climate state serialization failed: {err}"),
        }

        state.push((
            self.topics.setpoint_state.clone(),
            format!("{:.1}", snapshot.target_f),
        ));
        state.push((
            self.topics.mode_state.clone(),
            snapshot.mode.hub_mode().to_string(),
        ));
        for device in [Device::Heat, Device::Cool] {
            if let Some(topic) = self.topics.switch_state(device) {
                state.push((
                    topic.to_string(),
                    switch_payload(snapshot.actual.get(device)).to_string(),
                ));
            }
        }

        state
    }
}

fn switch_payload(on: bool) -> &'static str {
    if on {
        PAYLOAD_ON
    } else {
        PAYLOAD_OFF
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case(PAYLOAD_ON) {
        Some(true)
    } else if value.eq_ignore_ascii_case(PAYLOAD_OFF) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bridge() -> StateSyncBridge {
        StateSyncBridge::new(&BridgeConfig::default(), &ControlConfig::default()).unwrap()
    }

    fn snapshot() -> StateSnapshot {
        StateSnapshot {
            mode: Mode::Auto,
            target_f: 70.0,
            reading: Some(Reading::new(68.4, 41.0, 0)),
            actual: ActuatorSet::OFF,
            pending: ActuatorSet::OFF,
            stale: false,
        }
    }

    fn find<'a>(messages: &'a [OutboundMessage], topic: &str) -> Option<&'a OutboundMessage> {
        messages.iter().find(|message| message.topic == topic)
    }

    #[test]
    fn connect_publishes_availability_discovery_and_state() {
        let mut bridge = bridge();
        let messages = bridge.on_connected(&snapshot(), 0);

        assert_eq!(messages[0].topic, "climate/status");
        assert_eq!(messages[0].payload, "online");
        assert!(messages.iter().all(|message| message.retain));

        let discovery = messages
            .iter()
            .filter(|message| message.topic.starts_with("homeassistant/"))
            .count();
        assert_eq!(discovery, 5);

        assert_eq!(
            find(&messages, "climate/sensor/temperature/state").map(|m| m.payload.as_str()),
            Some("68.4")
        );
        assert_eq!(
            find(&messages, "climate/climate/mode/state").map(|m| m.payload.as_str()),
            Some("auto")
        );
    }

    #[test]
    fn sync_publishes_only_changes() {
        let mut bridge = bridge();
        let mut state = snapshot();
        bridge.on_connected(&state, 0);

        assert!(bridge.sync(&state, 1_000).is_empty());

        state.actual = ActuatorSet::only(Device::Heat);
        let messages = bridge.sync(&state, 2_000);
        let topics: Vec<&str> = messages.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(topics, vec!["climate/climate/state", "climate/switch/heat/state"]);
        assert_eq!(messages[1].payload, "ON");

        let climate: serde_json::Value = serde_json::from_str(&messages[0].payload).unwrap();
        assert_eq!(climate["action"], "heating");

        assert!(bridge.sync(&state, 3_000).is_empty());
    }

    #[test]
    fn manual_mode_is_reported_as_off() {
        let mut bridge = bridge();
        let mut state = snapshot();
        state.mode = Mode::Manual;
        state.actual = ActuatorSet::only(Device::Cool);

        let messages = bridge.on_connected(&state, 0);
        assert_eq!(
            find(&messages, "climate/climate/mode/state").map(|m| m.payload.as_str()),
            Some("off")
        );
        assert_eq!(
            find(&messages, "climate/switch/cool/state").map(|m| m.payload.as_str()),
            Some("ON")
        );
    }

    #[test]
    fn nothing_is_sent_while_disconnected() {
        let mut bridge = bridge();
        let mut state = snapshot();
        bridge.on_connected(&state, 0);
        bridge.on_disconnected();

        state.target_f = 72.0;
        assert!(bridge.sync(&state, 1_000).is_empty());
        assert!(bridge.announce(&state, 1_000).is_empty());
        assert!(bridge.goodbye().is_empty());
    }

    #[test]
    fn heartbeat_repeats_availability() {
        let mut bridge = bridge();
        let state = snapshot();
        bridge.on_connected(&state, 0);

        assert!(bridge.sync(&state, 59_999).is_empty());
        let messages = bridge.sync(&state, 60_000);
        assert_eq!(
            messages,
            vec![OutboundMessage::retained("climate/status", "online")]
        );
    }

    #[test]
    fn parses_valid_commands() {
        let bridge = bridge();

        assert_eq!(
            bridge.parse_inbound("climate/climate/setpoint/set", b" 71.5 "),
            Ok(Some(Command::SetTarget(71.5)))
        );
        assert_eq!(
            bridge.parse_inbound("climate/climate/mode/set", b"fan_only"),
            Ok(Some(Command::SetMode(Mode::Fan)))
        );
        assert_eq!(
            bridge.parse_inbound("climate/switch/cool/set", b"on"),
            Ok(Some(Command::Switch {
                device: Device::Cool,
                on: true
            }))
        );
        assert_eq!(
            bridge.parse_inbound("climate/discovery", b""),
            Ok(Some(Command::Announce))
        );
        assert_eq!(
            bridge.parse_inbound("homeassistant/status", b"online"),
            Ok(Some(Command::Announce))
        );
        assert_eq!(bridge.parse_inbound("homeassistant/status", b"offline"), Ok(None));
    }

    #[test]
    fn rejects_malformed_and_out_of_range_commands() {
        let bridge = bridge();

        assert_eq!(
            bridge.parse_inbound("climate/climate/setpoint/set", b"120"),
            Err(CommandError::OutOfRange {
                value: 120.0,
                min: 60.0,
                max: 84.0
            })
        );
        assert!(matches!(
            bridge.parse_inbound("climate/climate/setpoint/set", b"NaN"),
            Err(CommandError::Malformed { .. })
        ));
        assert!(matches!(
            bridge.parse_inbound("climate/climate/mode/set", b"dry"),
            Err(CommandError::Malformed { .. })
        ));
        assert!(matches!(
            bridge.parse_inbound("climate/switch/heat/set", b"maybe"),
            Err(CommandError::Malformed { .. })
        ));
        assert_eq!(
            bridge.parse_inbound("climate/switch/heat/set", &[0xff, 0xfe]),
            Err(CommandError::NotUtf8)
        );
        assert_eq!(
            bridge.parse_inbound("climate/climate/mode/set", &[b'a'; 600]),
            Err(CommandError::Oversized { len: 600 })
        );
        assert_eq!(
            bridge.parse_inbound("elsewhere", b"on"),
            Err(CommandError::UnknownTopic("elsewhere".to_string()))
        );
    }

    #[test]
    fn master_off_topic_maps_to_master_off() {
        let config = BridgeConfig {
            master_off_topic: Some("house/master/state".to_string()),
            ..BridgeConfig::default()
        };
        let bridge = StateSyncBridge::new(&config, &ControlConfig::default()).unwrap();
        assert_eq!(
            bridge.parse_inbound("house/master/state", b"OFF"),
            Ok(Some(Command::MasterOff))
        );
    }
}
