use thiserror::Error;

use crate::types::{ActuatorSet, Device};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("sensor read timed out")]
    Timeout,
    #[error("sensor frame failed checksum")]
    Checksum,
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// Why an inbound command was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("no command is bound to topic {0}")]
    UnknownTopic(String),
    #[error("payload too large ({len} bytes)")]
    Oversized { len: usize },
    #[error("payload is not valid utf-8")]
    NotUtf8,
    #[error("malformed payload {payload:?} on {topic}")]
    Malformed { topic: String, payload: String },
    #[error("value {value} outside {min}..={max}")]
    OutOfRange { value: f32, min: f32, max: f32 },
    #[error("command queue full")]
    QueueFull,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelayError {
    #[error("failed to drive {device:?} relay: {reason}")]
    Write { device: Device, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActuatorError {
    /// The engine asked for a combination the hardware must never see.
    #[error("invariant violation: requested {requested:?}")]
    InvariantViolation { requested: ActuatorSet },
    #[error(transparent)]
    Relay(#[from] RelayError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("publish to {topic} timed out")]
    PublishTimeout { topic: String },
    #[error("mqtt client error: {0}")]
    Client(String),
}
