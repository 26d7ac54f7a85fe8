use crate::{
    error::SensorError,
    types::{ActuatorSet, Reading},
};

/// Source of temperature/humidity samples.
///
/// Implementations must return within a bounded time; a timeout is reported
/// as `SensorError::Timeout`, never by blocking the caller.
pub trait ReadingSource {
    fn read(&mut self) -> Result<Reading, SensorError>;
}

/// First-order room model used when no physical sensor is attached.
///
/// Temperature relaxes toward the outdoor value and is pushed up or down by
/// whichever conditioning relay is on.
#[derive(Debug, Clone)]
pub struct SimulatedRoom {
    temperature_f: f32,
    humidity: f32,
    outdoor_f: f32,
    outputs: ActuatorSet,
    now_ms: u64,
    last_step_ms: u64,
}

const LEAK_PER_MINUTE: f32 = 0.02;
const HEAT_F_PER_MINUTE: f32 = 0.5;
const COOL_F_PER_MINUTE: f32 = 0.4;

impl SimulatedRoom {
    pub fn new(temperature_f: f32, humidity: f32, outdoor_f: f32) -> Self {
        Self {
            temperature_f,
            humidity,
            outdoor_f,
            outputs: ActuatorSet::OFF,
            now_ms: 0,
            last_step_ms: 0,
        }
    }

    pub fn temperature_f(&self) -> f32 {
        self.temperature_f
    }

    /// Advance the model to `now_ms` with the given relays energised.
    pub fn tick(&mut self, now_ms: u64, outputs: ActuatorSet) {
        let elapsed_min = now_ms.saturating_sub(self.last_step_ms) as f32 / 60_000.0;
        let mut delta = (self.outdoor_f - self.temperature_f) * LEAK_PER_MINUTE * elapsed_min;
        if self.outputs.heat {
            delta += HEAT_F_PER_MINUTE * elapsed_min;
        }
        if self.outputs.cool {
            delta -= COOL_F_PER_MINUTE * elapsed_min;
            self.humidity = (self.humidity - 0.1 * elapsed_min).max(20.0);
        }
        self.temperature_f += delta;
        self.outputs = outputs;
        self.now_ms = now_ms;
        self.last_step_ms = now_ms;
    }
}

impl ReadingSource for SimulatedRoom {
    fn read(&mut self) -> Result<Reading, SensorError> {
        Ok(Reading::new(self.temperature_f, self.humidity, self.now_ms))
    }
}
