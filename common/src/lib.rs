pub mod bridge;
pub mod commands;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod guard;
pub mod presenter;
pub mod relay;
pub mod sensor;
pub mod topics;
pub mod types;

pub use bridge::{OutboundMessage, StateSnapshot, StateSyncBridge, MAX_MQTT_PAYLOAD_BYTES};
pub use commands::{Command, CommandQueue, CommandSource};
pub use config::{
    BridgeConfig, ControlConfig, DisplayConfig, NetworkConfig, RelayConfig, RuntimeConfig,
    StalePolicy,
};
pub use controller::{ClimateController, CycleOutcome};
pub use discovery::DiscoveryRecord;
pub use engine::{ControlEngine, Exclusivity, ManualCommand};
pub use error::{ActuatorError, CommandError, RelayError, SensorError, TransportError};
pub use guard::CycleGuard;
pub use presenter::{Presenter, PresenterFrame};
pub use relay::{ApplyReport, MemoryOutput, RelayActuator, RelayOutput};
pub use sensor::{ReadingSource, SimulatedRoom};
pub use types::{ActuatorSet, Device, HvacAction, Mode, Reading, Setpoint, TemperatureUnit};
