use crate::types::{ActuatorSet, HvacAction, Mode, Reading, Setpoint};

pub const BLINK_PERIOD_MS: u64 = 500;

/// Everything a display needs for one frame, in display-ready form.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenterFrame {
    pub mode: Mode,
    pub reading: Option<Reading>,
    pub stale: bool,
    pub setpoint: Setpoint,
    pub actual: ActuatorSet,
    pub pending: ActuatorSet,
    pub action: HvacAction,
}

impl PresenterFrame {
    pub fn display_temperature(&self) -> Option<f32> {
        let unit = self.setpoint.display_unit;
        self.reading
            .map(|reading| unit.convert_from_fahrenheit(reading.temperature_f))
    }

    pub fn display_setpoint(&self) -> f32 {
        self.setpoint.display_value()
    }

    /// Whether the pending indicator is lit at `now_ms`. Solid off when
    /// nothing is waiting on the cycle guard.
    pub fn indicator_lit(&self, now_ms: u64) -> bool {
        self.pending.any() && (now_ms / BLINK_PERIOD_MS) % 2 == 0
    }
}

/// Renders controller state. Must not block the control loop.
pub trait Presenter {
    /// `now_ms` drives blink timing; see [`PresenterFrame::indicator_lit`].
    fn render(&mut self, frame: &PresenterFrame, now_ms: u64);
}
