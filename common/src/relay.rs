use tracing::{debug, error, info, warn};

use crate::{
    engine::Exclusivity,
    error::{ActuatorError, RelayError},
    guard::CycleGuard,
    types::{ActuatorSet, Device},
};

/// A physical (or remote) output that can switch one device.
pub trait RelayOutput {
    fn write(&mut self, device: Device, on: bool) -> Result<(), RelayError>;
}

/// In-memory output that records every write. Used for simulation and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    pub writes: Vec<(Device, bool)>,
    pub failing: Option<Device>,
}

impl RelayOutput for MemoryOutput {
    fn write(&mut self, device: Device, on: bool) -> Result<(), RelayError> {
        if self.failing == Some(device) {
            return Err(RelayError::Write {
                device,
                reason: "simulated failure".to_string(),
            });
        }
        self.writes.push((device, on));
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub applied: ActuatorSet,
    /// Devices whose desired state differs from actual and could not change.
    pub pending: ActuatorSet,
    pub changes: Vec<(Device, bool)>,
    pub failures: Vec<RelayError>,
}

/// Owns actual relay state and the cycle guard.
#[derive(Debug)]
pub struct RelayActuator<O> {
    output: O,
    guard: CycleGuard,
    actual: ActuatorSet,
    pending: ActuatorSet,
}

impl<O: RelayOutput> RelayActuator<O> {
    pub fn new(output: O, guard: CycleGuard) -> Self {
        Self {
            output,
            guard,
            actual: ActuatorSet::OFF,
            pending: ActuatorSet::OFF,
        }
    }

    pub fn actual(&self) -> ActuatorSet {
        self.actual
    }

    pub fn pending(&self) -> ActuatorSet {
        self.pending
    }

    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Drive the outputs toward `desired`.
    ///
    /// `safety_off` lets OFF transitions bypass the cycle guard. OFFs also
    /// bypass it while the current outputs break `exclusivity`, which happens
    /// when a mode change tightens the rule. A desired set that breaks
    /// `exclusivity` is a defect upstream: nothing from it is applied and
    /// every output is forced off.
    pub fn apply(
        &mut self,
        desired: ActuatorSet,
        exclusivity: Exclusivity,
        safety_off: bool,
        now_ms: u64,
    ) -> Result<ApplyReport, ActuatorError> {
        if !exclusivity.permits(&desired) {
            error!("refusing mutually exclusive request {desired:?}; forcing all outputs off");
            self.fail_safe(now_ms);
            return Err(ActuatorError::InvariantViolation { requested: desired });
        }

        let mut report = ApplyReport::default();
        let mut pending = ActuatorSet::OFF;
        let tightened = !exclusivity.permits(&self.actual);
        if tightened {
            debug!("outputs {:?} exceed the active rule; off bypasses cycle guard", self.actual);
        }

        for device in Device::ALL {
            if !self.actual.get(device) || desired.get(device) {
                continue;
            }
            if safety_off || tightened || self.guard.allow(device, now_ms) {
                if !self.switch(device, false, now_ms, &mut report) {
                    pending.set(device, true);
                }
            } else {
                debug!(
                    "{} off blocked by cycle guard for {}ms",
                    device.as_str(),
                    self.guard.remaining_ms(device, now_ms)
                );
                pending.set(device, true);
            }
        }

        for device in Device::ALL {
            if self.actual.get(device) || !desired.get(device) {
                continue;
            }

            let mut candidate = self.actual;
            candidate.set(device, true);
            if !exclusivity.permits(&candidate) {
                debug!("{} on deferred until partner turns off", device.as_str());
                pending.set(device, true);
                continue;
            }

            if self.guard.allow(device, now_ms) {
                if !self.switch(device, true, now_ms, &mut report) {
                    pending.set(device, true);
                }
            } else {
                debug!(
                    "{} on blocked by cycle guard for {}ms",
                    device.as_str(),
                    self.guard.remaining_ms(device, now_ms)
                );
                pending.set(device, true);
            }
        }

        self.pending = pending;
        report.applied = self.actual;
        report.pending = pending;
        Ok(report)
    }

    /// Turn every active output off, ignoring the cycle guard.
    pub fn fail_safe(&mut self, now_ms: u64) -> ApplyReport {
        let mut report = ApplyReport::default();
        for device in Device::ALL {
            if self.actual.get(device) && !self.switch(device, false, now_ms, &mut report) {
                error!("{} relay could not be forced off", device.as_str());
            }
        }
        self.pending = ActuatorSet::OFF;
        report.applied = self.actual;
        report
    }

    fn switch(&mut self, device: Device, on: bool, now_ms: u64, report: &mut ApplyReport) -> bool {
        match self.output.write(device, on) {
            Ok(()) => {
                self.actual.set(device, on);
                self.guard.record(device, now_ms);
                report.changes.push((device, on));
                info!("{} relay {}", device.as_str(), if on { "on" } else { "off" });
                true
            }
            Err(err) => {
                warn!("{err}");
                report.failures.push(err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn actuator(min_cycle_ms: u64) -> RelayActuator<MemoryOutput> {
        RelayActuator::new(MemoryOutput::default(), CycleGuard::new(min_cycle_ms))
    }

    #[test]
    fn applies_change_and_records_guard() {
        let mut relay = actuator(300_000);
        let report = relay
            .apply(ActuatorSet::only(Device::Heat), Exclusivity::Single, false, 1_000)
            .unwrap();

        assert_eq!(report.applied, ActuatorSet::only(Device::Heat));
        assert_eq!(report.pending, ActuatorSet::OFF);
        assert_eq!(report.changes, vec![(Device::Heat, true)]);
        assert_eq!(relay.guard().last_change_ms(Device::Heat), Some(1_000));
    }

    #[test]
    fn guard_blocks_early_turn_off_and_reports_pending() {
        let mut relay = actuator(300_000);
        relay
            .apply(ActuatorSet::only(Device::Heat), Exclusivity::Single, false, 0)
            .unwrap();

        let report = relay
            .apply(ActuatorSet::OFF, Exclusivity::Single, false, 30_000)
            .unwrap();
        assert_eq!(report.applied, ActuatorSet::only(Device::Heat));
        assert_eq!(report.pending, ActuatorSet::only(Device::Heat));
        assert!(report.changes.is_empty());

        let report = relay
            .apply(ActuatorSet::OFF, Exclusivity::Single, false, 300_000)
            .unwrap();
        assert_eq!(report.applied, ActuatorSet::OFF);
        assert_eq!(report.pending, ActuatorSet::OFF);
    }

    #[test]
    fn safety_off_bypasses_guard() {
        let mut relay = actuator(300_000);
        relay
            .apply(ActuatorSet::only(Device::Cool), Exclusivity::Single, false, 0)
            .unwrap();

        let report = relay
            .apply(ActuatorSet::OFF, Exclusivity::Single, true, 5_000)
            .unwrap();
        assert_eq!(report.applied, ActuatorSet::OFF);
        assert_eq!(report.changes, vec![(Device::Cool, false)]);
    }

    #[test]
    fn switch_over_waits_for_partner_to_turn_off() {
        let mut relay = actuator(300_000);
        relay
            .apply(ActuatorSet::only(Device::Heat), Exclusivity::Single, false, 0)
            .unwrap();

        // Heat is still held on by the guard, so cool must not engage.
        let report = relay
            .apply(ActuatorSet::only(Device::Cool), Exclusivity::Single, false, 10_000)
            .unwrap();
        assert_eq!(report.applied, ActuatorSet::only(Device::Heat));
        assert_eq!(
            report.pending,
            ActuatorSet {
                heat: true,
                cool: true,
                fan: false
            }
        );

        let report = relay
            .apply(ActuatorSet::only(Device::Cool), Exclusivity::Single, false, 300_000)
            .unwrap();
        assert_eq!(report.applied, ActuatorSet::only(Device::Cool));
        assert_eq!(report.changes, vec![(Device::Heat, false), (Device::Cool, true)]);
    }

    #[test]
    fn fan_may_join_conditioning_under_heat_cool_rule() {
        let mut relay = actuator(0);
        let desired = ActuatorSet {
            heat: true,
            cool: false,
            fan: true,
        };
        let report = relay.apply(desired, Exclusivity::HeatCool, false, 0).unwrap();
        assert_eq!(report.applied, desired);
    }

    #[test]
    fn tightened_rule_switches_extra_outputs_off_inside_guard_window() {
        let mut relay = actuator(300_000);
        let conditioning = ActuatorSet {
            heat: true,
            cool: false,
            fan: true,
        };
        relay
            .apply(conditioning, Exclusivity::HeatCool, false, 0)
            .unwrap();

        let report = relay
            .apply(ActuatorSet::only(Device::Cool), Exclusivity::Single, false, 10_000)
            .unwrap();
        assert_eq!(report.applied, ActuatorSet::only(Device::Cool));
        assert_eq!(
            report.changes,
            vec![(Device::Heat, false), (Device::Fan, false), (Device::Cool, true)]
        );
    }

    #[test]
    fn invariant_violation_forces_everything_off() {
        let mut relay = actuator(300_000);
        relay
            .apply(ActuatorSet::only(Device::Fan), Exclusivity::Single, false, 0)
            .unwrap();

        let bad = ActuatorSet {
            heat: true,
            cool: true,
            fan: false,
        };
        let err = relay
            .apply(bad, Exclusivity::HeatCool, false, 1_000)
            .unwrap_err();

        assert_eq!(err, ActuatorError::InvariantViolation { requested: bad });
        assert_eq!(relay.actual(), ActuatorSet::OFF);
        assert_eq!(
            relay.output().writes,
            vec![(Device::Fan, true), (Device::Fan, false)]
        );
    }

    #[test]
    fn failed_write_leaves_device_pending() {
        let mut relay = RelayActuator::new(
            MemoryOutput {
                writes: Vec::new(),
                failing: Some(Device::Heat),
            },
            CycleGuard::new(0),
        );

        let report = relay
            .apply(ActuatorSet::only(Device::Heat), Exclusivity::Single, false, 0)
            .unwrap();
        assert_eq!(report.applied, ActuatorSet::OFF);
        assert_eq!(report.pending, ActuatorSet::only(Device::Heat));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(relay.guard().last_change_ms(Device::Heat), None);
    }

    #[test]
    fn fail_safe_turns_all_outputs_off() {
        let mut relay = actuator(300_000);
        relay
            .apply(
                ActuatorSet {
                    heat: false,
                    cool: true,
                    fan: true,
                },
                Exclusivity::HeatCool,
                false,
                0,
            )
            .unwrap();

        let report = relay.fail_safe(1);
        assert_eq!(report.applied, ActuatorSet::OFF);
        assert_eq!(report.changes, vec![(Device::Cool, false), (Device::Fan, false)]);
    }
}
