use tracing::{debug, error, info, warn};

use crate::{
    bridge::{OutboundMessage, StateSnapshot, StateSyncBridge},
    commands::{Command, CommandQueue, CommandSource},
    config::RuntimeConfig,
    engine::{ControlEngine, ManualCommand},
    error::{ActuatorError, CommandError, SensorError},
    guard::CycleGuard,
    presenter::PresenterFrame,
    relay::{ApplyReport, RelayActuator, RelayOutput},
    types::{HvacAction, Mode, Reading},
};

/// Result of one poll-decide-apply-sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub outbound: Vec<OutboundMessage>,
    pub frame: PresenterFrame,
    pub report: Option<ApplyReport>,
    pub violation: Option<ActuatorError>,
}

/// Composes engine, relays and bridge into a single synchronous cycle.
///
/// Inbound commands are only queued between cycles and consumed at the start
/// of the next one, so mode and setpoint never change mid-decision.
#[derive(Debug)]
pub struct ClimateController<O> {
    engine: ControlEngine,
    relay: RelayActuator<O>,
    bridge: StateSyncBridge,
    commands: CommandQueue,
}

impl<O: RelayOutput> ClimateController<O> {
    pub fn new(config: &RuntimeConfig, output: O) -> Result<Self, serde_json::Error> {
        let engine = ControlEngine::new(config.control.clone(), config.display.unit);
        let relay = RelayActuator::new(output, CycleGuard::new(config.control.min_cycle_ms));
        let bridge = StateSyncBridge::new(&config.bridge, &config.control)?;
        Ok(Self {
            engine,
            relay,
            bridge,
            commands: CommandQueue::default(),
        })
    }

    pub fn engine(&self) -> &ControlEngine {
        &self.engine
    }

    pub fn relay(&self) -> &RelayActuator<O> {
        &self.relay
    }

    pub fn bridge(&self) -> &StateSyncBridge {
        &self.bridge
    }

    pub fn queued_commands(&self) -> usize {
        self.commands.len()
    }

    pub fn submit(&mut self, command: Command, source: CommandSource) -> Result<(), CommandError> {
        self.commands.push(command, source).inspect_err(|err| {
            warn!("dropping {command:?}: {err}");
        })
    }

    /// Validate and queue an inbound hub message.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Result<Option<Command>, CommandError> {
        let command = match self.bridge.parse_inbound(topic, payload) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!("dropping message on {topic}: {err}");
                return Err(err);
            }
        };
        self.submit(command, CommandSource::Remote)?;
        Ok(Some(command))
    }

    pub fn on_connected(&mut self, now_ms: u64) -> Vec<OutboundMessage> {
        let snapshot = self.snapshot();
        self.bridge.on_connected(&snapshot, now_ms)
    }

    pub fn on_disconnected(&mut self) {
        self.bridge.on_disconnected();
    }

    /// Run one full cycle.
    ///
    /// `reading` is `None` when the sensor was not polled this cycle. A sensor
    /// failure is treated as an invalid sample, never as fatal.
    pub fn run_cycle(
        &mut self,
        reading: Option<Result<Reading, SensorError>>,
        now_ms: u64,
    ) -> CycleOutcome {
        let reading = reading.map(|result| {
            result.unwrap_or_else(|err| {
                warn!("sensor read failed: {err}");
                Reading::invalid(now_ms)
            })
        });

        let (manual, announce) = self.consume_commands();
        let requested = self.engine.decide(reading.as_ref(), &manual, now_ms);

        let safety_off = self.engine.mode() == Mode::Off;
        let (report, violation) =
            match self
                .relay
                .apply(requested, self.engine.exclusivity(), safety_off, now_ms)
            {
                Ok(report) => (Some(report), None),
                Err(err) => {
                    error!("actuation halted for this cycle: {err}");
                    (None, Some(err))
                }
            };

        let snapshot = self.snapshot();
        let mut outbound = if announce {
            self.bridge.announce(&snapshot, now_ms)
        } else {
            Vec::new()
        };
        outbound.extend(self.bridge.sync(&snapshot, now_ms));

        CycleOutcome {
            outbound,
            frame: self.frame(),
            report,
            violation,
        }
    }

    /// Drive every output off and emit the final state plus "offline".
    pub fn shutdown(&mut self, now_ms: u64) -> Vec<OutboundMessage> {
        let report = self.relay.fail_safe(now_ms);
        info!(
            "shutdown fail-safe applied ({} output(s) switched off)",
            report.changes.len()
        );
        let snapshot = self.snapshot();
        let mut outbound = self.bridge.sync(&snapshot, now_ms);
        outbound.extend(self.bridge.goodbye());
        outbound
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            mode: self.engine.mode(),
            target_f: self.engine.target_f(),
            reading: self.engine.last_reading().copied(),
            actual: self.relay.actual(),
            pending: self.relay.pending(),
            stale: self.engine.is_stale(),
        }
    }

    pub fn frame(&self) -> PresenterFrame {
        let actual = self.relay.actual();
        PresenterFrame {
            mode: self.engine.mode(),
            reading: self.engine.last_reading().copied(),
            stale: self.engine.is_stale(),
            setpoint: self.engine.setpoint(),
            actual,
            pending: self.relay.pending(),
            action: HvacAction::from_actual(&actual),
        }
    }

    fn consume_commands(&mut self) -> (Vec<ManualCommand>, bool) {
        let mut manual = Vec::new();
        let mut announce = false;

        for queued in self.commands.drain() {
            match queued.command {
                Command::SetMode(mode) => {
                    if self.engine.set_mode(mode) {
                        manual.clear();
                    }
                }
                Command::NextMode => {
                    self.engine.next_mode();
                    manual.clear();
                }
                Command::SetTarget(target_f) => {
                    if !target_f.is_finite() {
                        warn!("ignoring non-finite setpoint");
                        continue;
                    }
                    self.engine.set_target_temp(target_f);
                }
                Command::Switch { device, on } => {
                    if self.engine.mode() != Mode::Manual {
                        if queued.source == CommandSource::Local {
                            debug!(
                                "ignoring local {} switch outside manual mode",
                                device.as_str()
                            );
                            continue;
                        }
                        info!("remote {} switch; entering manual mode", device.as_str());
                        self.engine.set_mode(Mode::Manual);
                        manual.clear();
                    }
                    manual.push(ManualCommand { device, on });
                }
                Command::MasterOff => {
                    if self.engine.set_mode(Mode::Off) {
                        info!("master off");
                        manual.clear();
                    }
                }
                Command::Announce => announce = true,
            }
        }

        (manual, announce)
    }
}
