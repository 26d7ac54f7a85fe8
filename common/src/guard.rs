use crate::types::Device;

/// Per-actuator minimum-cycle timer.
///
/// Tracks when each device last changed physical state. Entries only move
/// forward when an actuation was actually applied, never on a mere request.
#[derive(Debug, Clone)]
pub struct CycleGuard {
    min_cycle_ms: u64,
    last_change_ms: [Option<u64>; 3],
}

impl CycleGuard {
    pub fn new(min_cycle_ms: u64) -> Self {
        Self {
            min_cycle_ms,
            last_change_ms: [None; 3],
        }
    }

    /// Whether `device` may change state at `now_ms`, in either direction.
    pub fn allow(&self, device: Device, now_ms: u64) -> bool {
        self.remaining_ms(device, now_ms) == 0
    }

    pub fn record(&mut self, device: Device, now_ms: u64) {
        self.last_change_ms[device.index()] = Some(now_ms);
    }

    pub fn last_change_ms(&self, device: Device) -> Option<u64> {
        self.last_change_ms[device.index()]
    }

    pub fn remaining_ms(&self, device: Device, now_ms: u64) -> u64 {
        match self.last_change_ms[device.index()] {
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last);
                self.min_cycle_ms.saturating_sub(elapsed)
            }
            None => 0,
        }
    }
}
