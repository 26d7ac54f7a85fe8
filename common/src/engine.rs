use tracing::{debug, warn};

use crate::{
    config::{ControlConfig, StalePolicy},
    types::{ActuatorSet, Device, Mode, Reading, Setpoint, TemperatureUnit},
};

/// Explicit per-device request issued while in MANUAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualCommand {
    pub device: Device,
    pub on: bool,
}

/// Which combinations of devices may be active at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusivity {
    /// Heat and cool are mutually exclusive; the fan may accompany either.
    HeatCool,
    /// At most one device of heat/cool/fan.
    Single,
}

impl Exclusivity {
    pub fn permits(self, set: &ActuatorSet) -> bool {
        match self {
            Self::HeatCool => !(set.heat && set.cool),
            Self::Single => set.active_count() <= 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Demand {
    Idle,
    Heat,
    Cool,
}

/// Mode state machine plus the AUTO hysteresis decision.
///
/// Owns mode, setpoint and the requested actuator set. It never touches
/// hardware; the relay actuator turns its decisions into physical state.
#[derive(Debug, Clone)]
pub struct ControlEngine {
    pub config: ControlConfig,
    mode: Mode,
    target_f: f32,
    display_unit: TemperatureUnit,

    requested: ActuatorSet,
    manual: ActuatorSet,
    demand: Demand,

    last_good: Option<Reading>,
    last_sample_valid: bool,
    stale: bool,
}

impl ControlEngine {
    pub fn new(config: ControlConfig, display_unit: TemperatureUnit) -> Self {
        let target_f = config
            .initial_target_f
            .clamp(config.min_target_f, config.max_target_f);
        Self {
            config,
            mode: Mode::Off,
            target_f,
            display_unit,
            requested: ActuatorSet::OFF,
            manual: ActuatorSet::OFF,
            demand: Demand::Idle,
            last_good: None,
            last_sample_valid: false,
            stale: true,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn target_f(&self) -> f32 {
        self.target_f
    }

    pub fn setpoint(&self) -> Setpoint {
        Setpoint {
            target_f: self.target_f,
            display_unit: self.display_unit,
        }
    }

    pub fn requested(&self) -> ActuatorSet {
        self.requested
    }

    /// True when the last sample was invalid or the last good one is too old.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn last_reading(&self) -> Option<&Reading> {
        self.last_good.as_ref()
    }

    /// Jump directly to `mode`. The requested set drops to all-off until the
    /// next `decide` evaluates the new mode.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        if self.mode == mode {
            return false;
        }
        debug!("mode {} -> {}", self.mode.as_str(), mode.as_str());
        self.mode = mode;
        self.requested = ActuatorSet::OFF;
        self.manual = ActuatorSet::OFF;
        self.demand = Demand::Idle;
        true
    }

    pub fn next_mode(&mut self) -> Mode {
        let next = self.mode.next();
        self.set_mode(next);
        next
    }

    pub fn set_target_temp(&mut self, temp_f: f32) -> bool {
        if !temp_f.is_finite() {
            return false;
        }
        let clamped = temp_f.clamp(self.config.min_target_f, self.config.max_target_f);
        if (self.target_f - clamped).abs() > f32::EPSILON {
            self.target_f = clamped;
            true
        } else {
            false
        }
    }

    pub fn exclusivity(&self) -> Exclusivity {
        match self.mode {
            Mode::Auto if self.config.fan_with_conditioning => Exclusivity::HeatCool,
            _ => Exclusivity::Single,
        }
    }

    /// Compute the requested actuator set for this cycle.
    ///
    /// `reading` is `None` when no new sample was taken this cycle; the last
    /// good sample is then reused. Manual commands are only honoured in MANUAL.
    pub fn decide(
        &mut self,
        reading: Option<&Reading>,
        manual_commands: &[ManualCommand],
        now_ms: u64,
    ) -> ActuatorSet {
        if let Some(reading) = reading {
            self.observe(reading);
        }
        self.stale = self.input_stale(now_ms);

        if self.mode != Mode::Manual && !manual_commands.is_empty() {
            debug!(
                "ignoring {} manual command(s) outside manual mode",
                manual_commands.len()
            );
        }

        let requested = match self.mode {
            Mode::Off => ActuatorSet::OFF,
            Mode::Heat => ActuatorSet::only(Device::Heat),
            Mode::Cool => ActuatorSet::only(Device::Cool),
            Mode::Fan => ActuatorSet::only(Device::Fan),
            Mode::Manual => {
                self.apply_manual(manual_commands);
                self.manual
            }
            Mode::Auto => self.decide_auto(),
        };

        self.requested = requested;
        requested
    }

    fn observe(&mut self, reading: &Reading) {
        let plausible = reading.valid
            && (self.config.min_valid_temp_f..=self.config.max_valid_temp_f)
                .contains(&reading.temperature_f);

        if plausible {
            self.last_good = Some(*reading);
            self.last_sample_valid = true;
        } else {
            if self.last_sample_valid {
                warn!("discarding invalid reading; control input is stale");
            }
            self.last_sample_valid = false;
        }
    }

    fn input_stale(&self, now_ms: u64) -> bool {
        if !self.last_sample_valid {
            return true;
        }
        self.last_good
            .map(|reading| {
                now_ms.saturating_sub(reading.taken_at_ms) >= self.config.sensor_stale_timeout_ms
            })
            .unwrap_or(true)
    }

    fn decide_auto(&mut self) -> ActuatorSet {
        let current = match self.last_good {
            Some(reading) if !self.stale => reading.temperature_f,
            _ => {
                return match self.config.stale_policy {
                    StalePolicy::HoldDecision => self.requested,
                    StalePolicy::ForceOff => {
                        self.demand = Demand::Idle;
                        ActuatorSet::OFF
                    }
                };
            }
        };

        let enter_heat = self.target_f - self.config.cold_tolerance_f;
        let enter_cool = self.target_f + self.config.heat_tolerance_f;

        // Entry needs the wide band, exit only needs the setpoint.
        self.demand = match self.demand {
            Demand::Heat if current < self.target_f => Demand::Heat,
            Demand::Cool if current > self.target_f => Demand::Cool,
            _ if current <= enter_heat => Demand::Heat,
            _ if current >= enter_cool => Demand::Cool,
            _ => Demand::Idle,
        };

        let conditioning = self.demand != Demand::Idle;
        ActuatorSet {
            heat: self.demand == Demand::Heat,
            cool: self.demand == Demand::Cool,
            fan: conditioning && self.config.fan_with_conditioning,
        }
    }

    fn apply_manual(&mut self, commands: &[ManualCommand]) {
        let mut switched_on: Option<Device> = None;

        for command in commands {
            if !command.on {
                self.manual.set(command.device, false);
                continue;
            }

            if let Some(first) = switched_on {
                if first != command.device {
                    warn!(
                        "rejecting manual {} on: {} already switched on this cycle",
                        command.device.as_str(),
                        first.as_str()
                    );
                    continue;
                }
            }

            self.manual = ActuatorSet::only(command.device);
            switched_on = Some(command.device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine_with(cold: f32, heat: f32) -> ControlEngine {
        let config = ControlConfig {
            cold_tolerance_f: cold,
            heat_tolerance_f: heat,
            ..ControlConfig::default()
        };
        let mut engine = ControlEngine::new(config, TemperatureUnit::Fahrenheit);
        engine.set_target_temp(70.0);
        engine.set_mode(Mode::Auto);
        engine
    }

    fn sample(engine: &mut ControlEngine, temp_f: f32, now_ms: u64) -> ActuatorSet {
        engine.decide(Some(&Reading::new(temp_f, 40.0, now_ms)), &[], now_ms)
    }

    #[test]
    fn heat_enters_at_cold_band_and_exits_at_setpoint() {
        let mut engine = engine_with(2.0, 2.0);

        assert_eq!(sample(&mut engine, 68.5, 0), ActuatorSet::OFF);
        assert_eq!(sample(&mut engine, 68.0, 1_000), ActuatorSet::only(Device::Heat));
        assert_eq!(sample(&mut engine, 69.9, 2_000), ActuatorSet::only(Device::Heat));
        assert_eq!(sample(&mut engine, 70.0, 3_000), ActuatorSet::OFF);

        for (i, temp) in [69.5, 69.9, 69.6, 69.8, 69.5].into_iter().enumerate() {
            let now = 4_000 + i as u64 * 1_000;
            assert_eq!(sample(&mut engine, temp, now), ActuatorSet::OFF);
        }
    }

    #[test]
    fn cool_enters_at_heat_band_and_exits_at_setpoint() {
        let mut engine = engine_with(2.0, 2.0);

        assert_eq!(sample(&mut engine, 71.9, 0), ActuatorSet::OFF);
        assert_eq!(sample(&mut engine, 72.0, 1_000), ActuatorSet::only(Device::Cool));
        assert_eq!(sample(&mut engine, 70.1, 2_000), ActuatorSet::only(Device::Cool));
        assert_eq!(sample(&mut engine, 70.0, 3_000), ActuatorSet::OFF);
    }

    #[test]
    fn tolerances_are_independent() {
        let mut engine = engine_with(0.5, 3.0);

        assert_eq!(sample(&mut engine, 69.5, 0), ActuatorSet::only(Device::Heat));
        assert_eq!(sample(&mut engine, 70.0, 1_000), ActuatorSet::OFF);
        assert_eq!(sample(&mut engine, 72.9, 2_000), ActuatorSet::OFF);
        assert_eq!(sample(&mut engine, 73.0, 3_000), ActuatorSet::only(Device::Cool));
    }

    #[test]
    fn fan_runs_with_conditioning_only_when_configured() {
        let mut engine = engine_with(2.0, 2.0);
        engine.config.fan_with_conditioning = true;

        let requested = sample(&mut engine, 67.0, 0);
        assert_eq!(
            requested,
            ActuatorSet {
                heat: true,
                cool: false,
                fan: true
            }
        );
        assert_eq!(engine.exclusivity(), Exclusivity::HeatCool);
        assert_eq!(sample(&mut engine, 70.5, 1_000), ActuatorSet::OFF);
    }

    #[test]
    fn invalid_reading_holds_last_decision() {
        let mut engine = engine_with(2.0, 2.0);
        assert_eq!(sample(&mut engine, 67.0, 0), ActuatorSet::only(Device::Heat));

        let held = engine.decide(Some(&Reading::invalid(1_000)), &[], 1_000);
        assert_eq!(held, ActuatorSet::only(Device::Heat));
        assert!(engine.is_stale());
        assert_eq!(engine.last_reading().map(|r| r.temperature_f), Some(67.0));

        // Still stale on ticks without a new sample.
        let held = engine.decide(None, &[], 2_000);
        assert_eq!(held, ActuatorSet::only(Device::Heat));
        assert!(engine.is_stale());
    }

    #[test]
    fn force_off_policy_drops_requests_on_stale_input() {
        let mut engine = engine_with(2.0, 2.0);
        engine.config.stale_policy = StalePolicy::ForceOff;
        assert_eq!(sample(&mut engine, 67.0, 0), ActuatorSet::only(Device::Heat));

        let requested = engine.decide(Some(&Reading::invalid(1_000)), &[], 1_000);
        assert_eq!(requested, ActuatorSet::OFF);
    }

    #[test]
    fn implausible_temperature_counts_as_invalid() {
        let mut engine = engine_with(2.0, 2.0);
        sample(&mut engine, 200.0, 0);
        assert!(engine.is_stale());
        assert!(engine.last_reading().is_none());
    }

    #[test]
    fn old_reading_goes_stale_after_timeout() {
        let mut engine = engine_with(2.0, 2.0);
        sample(&mut engine, 70.0, 0);
        assert!(!engine.is_stale());

        engine.decide(None, &[], 299_999);
        assert!(!engine.is_stale());
        engine.decide(None, &[], 300_000);
        assert!(engine.is_stale());
    }

    #[test]
    fn mode_change_forces_all_off_until_next_decide() {
        let mut engine = engine_with(2.0, 2.0);
        sample(&mut engine, 60.0, 0);
        assert!(engine.requested().heat);

        assert!(engine.set_mode(Mode::Cool));
        assert_eq!(engine.requested(), ActuatorSet::OFF);
        assert_eq!(
            engine.decide(None, &[], 1_000),
            ActuatorSet::only(Device::Cool)
        );
        assert!(!engine.set_mode(Mode::Cool));
    }

    #[test]
    fn forced_modes_request_their_device() {
        let mut engine = engine_with(2.0, 2.0);
        for (mode, device) in [
            (Mode::Heat, Device::Heat),
            (Mode::Cool, Device::Cool),
            (Mode::Fan, Device::Fan),
        ] {
            engine.set_mode(mode);
            assert_eq!(engine.decide(None, &[], 0), ActuatorSet::only(device));
        }
        engine.set_mode(Mode::Off);
        assert_eq!(engine.decide(None, &[], 0), ActuatorSet::OFF);
    }

    #[test]
    fn next_mode_cycles_through_all_modes() {
        let mut engine = ControlEngine::new(ControlConfig::default(), TemperatureUnit::Celsius);
        let visited: Vec<Mode> = (0..6).map(|_| engine.next_mode()).collect();
        assert_eq!(
            visited,
            vec![
                Mode::Auto,
                Mode::Manual,
                Mode::Heat,
                Mode::Cool,
                Mode::Fan,
                Mode::Off
            ]
        );
    }

    #[test]
    fn manual_on_replaces_previous_device() {
        let mut engine = engine_with(2.0, 2.0);
        engine.set_mode(Mode::Manual);

        let cool_on = ManualCommand {
            device: Device::Cool,
            on: true,
        };
        assert_eq!(
            engine.decide(None, &[cool_on], 0),
            ActuatorSet::only(Device::Cool)
        );

        let heat_on = ManualCommand {
            device: Device::Heat,
            on: true,
        };
        assert_eq!(
            engine.decide(None, &[heat_on], 1_000),
            ActuatorSet::only(Device::Heat)
        );

        let heat_off = ManualCommand {
            device: Device::Heat,
            on: false,
        };
        assert_eq!(engine.decide(None, &[heat_off], 2_000), ActuatorSet::OFF);
    }

    #[test]
    fn second_device_in_same_batch_is_rejected() {
        let mut engine = engine_with(2.0, 2.0);
        engine.set_mode(Mode::Manual);

        let batch = [
            ManualCommand {
                device: Device::Heat,
                on: true,
            },
            ManualCommand {
                device: Device::Fan,
                on: true,
            },
        ];
        assert_eq!(
            engine.decide(None, &batch, 0),
            ActuatorSet::only(Device::Heat)
        );
    }

    #[test]
    fn manual_commands_ignored_outside_manual_mode() {
        let mut engine = engine_with(2.0, 2.0);
        let command = ManualCommand {
            device: Device::Fan,
            on: true,
        };
        assert_eq!(
            engine.decide(Some(&Reading::new(70.0, 40.0, 0)), &[command], 0),
            ActuatorSet::OFF
        );
    }

    #[test]
    fn target_is_clamped_to_configured_bounds() {
        let mut engine = engine_with(2.0, 2.0);
        assert!(engine.set_target_temp(95.0));
        assert_eq!(engine.target_f(), 84.0);
        assert!(!engine.set_target_temp(f32::NAN));
        assert!(!engine.set_target_temp(84.0));
    }
}
