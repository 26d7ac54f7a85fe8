use tracing::{debug, info};

use climate_common::{Presenter, PresenterFrame};

/// Headless presenter: logs a status line whenever something a user would
/// see on the panel changes.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    last: Option<PresenterFrame>,
}

impl ConsolePresenter {
    fn visible_change(&self, frame: &PresenterFrame) -> bool {
        match &self.last {
            None => true,
            Some(last) => {
                last.mode != frame.mode
                    || last.actual != frame.actual
                    || last.pending != frame.pending
                    || last.stale != frame.stale
                    || last.setpoint != frame.setpoint
            }
        }
    }
}

fn pending_indicator(frame: &PresenterFrame, now_ms: u64) -> &'static str {
    match (frame.pending.any(), frame.indicator_lit(now_ms)) {
        (false, _) => "-",
        (true, true) => "*",
        (true, false) => "o",
    }
}

impl Presenter for ConsolePresenter {
    fn render(&mut self, frame: &PresenterFrame, now_ms: u64) {
        let unit = frame.setpoint.display_unit.symbol();
        let temperature = frame
            .display_temperature()
            .map(|value| format!("{value:.1}{unit}"))
            .unwrap_or_else(|| "--".to_string());
        let line = format!(
            "mode={} temp={temperature}{} target={:.1}{unit} action={} pending={}",
            frame.mode.as_str(),
            if frame.stale { " (stale)" } else { "" },
            frame.display_setpoint(),
            frame.action.as_str(),
            pending_indicator(frame, now_ms),
        );

        if self.visible_change(frame) {
            info!("{line}");
        } else {
            debug!("{line}");
        }
        self.last = Some(frame.clone());
    }
}
