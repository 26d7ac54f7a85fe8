use std::time::Duration;

use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use tracing::warn;

use climate_common::{
    config::{NetworkConfig, RelayConfig},
    Device, OutboundMessage, RelayError, RelayOutput, TransportError,
};

pub fn mqtt_options(network: &NetworkConfig, last_will: &OutboundMessage) -> MqttOptions {
    let mut options = MqttOptions::new(
        network.client_id.clone(),
        network.mqtt_host.clone(),
        network.mqtt_port,
    );
    options.set_keep_alive(Duration::from_secs(network.keep_alive_secs));
    if !network.mqtt_user.is_empty() {
        options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
    }
    options.set_last_will(LastWill::new(
        last_will.topic.clone(),
        last_will.payload.clone(),
        QoS::AtLeastOnce,
        last_will.retain,
    ));
    options
}

/// Exponential reconnect delay, doubling up to a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn from_config(network: &NetworkConfig) -> Self {
        Self::new(
            Duration::from_millis(network.reconnect_initial_ms),
            Duration::from_millis(network.reconnect_max_ms),
        )
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Relays that are themselves MQTT devices, switched by publishing to their
/// command topics.
#[derive(Clone)]
pub struct MqttRelayOutput {
    client: AsyncClient,
    relays: RelayConfig,
}

impl MqttRelayOutput {
    pub fn new(client: AsyncClient, relays: RelayConfig) -> Self {
        Self { client, relays }
    }

    fn topic(&self, device: Device) -> &str {
        match device {
            Device::Heat => &self.relays.heat_topic,
            Device::Cool => &self.relays.cool_topic,
            Device::Fan => &self.relays.fan_topic,
        }
    }
}

impl RelayOutput for MqttRelayOutput {
    fn write(&mut self, device: Device, on: bool) -> Result<(), RelayError> {
        let payload = if on {
            self.relays.payload_on.clone()
        } else {
            self.relays.payload_off.clone()
        };
        self.client
            .try_publish(self.topic(device), QoS::AtLeastOnce, true, payload)
            .map_err(|err| RelayError::Write {
                device,
                reason: err.to_string(),
            })
    }
}

/// Queue messages without waiting. Used from the event loop task, which must
/// never await its own request channel.
pub fn try_publish_all(client: &AsyncClient, messages: Vec<OutboundMessage>) {
    for message in messages {
        if let Err(err) = client.try_publish(
            message.topic.as_str(),
            QoS::AtLeastOnce,
            message.retain,
            message.payload,
        ) {
            warn!("publish to {} failed: {err}", message.topic);
        }
    }
}

pub async fn publish_all(client: &AsyncClient, messages: Vec<OutboundMessage>, timeout: Duration) {
    for message in messages {
        if let Err(err) = publish(client, message, timeout).await {
            warn!("{err}");
        }
    }
}

async fn publish(
    client: &AsyncClient,
    message: OutboundMessage,
    timeout: Duration,
) -> Result<(), TransportError> {
    let topic = message.topic.clone();
    let request = client.publish(
        message.topic,
        QoS::AtLeastOnce,
        message.retain,
        message.payload,
    );
    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TransportError::Client(err.to_string())),
        Err(_) => Err(TransportError::PublishTimeout { topic }),
    }
}
