use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use climate_common::{
    ActuatorSet, ClimateController, Command, CommandError, CommandSource, Device, Mode,
    RelayOutput,
};

use crate::host::AppState;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    mode: Mode,
    hub_mode: &'static str,
    target_f: f32,
    display_unit: &'static str,
    display_setpoint: f32,
    temperature_f: Option<f32>,
    humidity: Option<f32>,
    display_temperature: Option<f32>,
    stale: bool,
    actual: ActuatorSet,
    pending: ActuatorSet,
    action: &'static str,
    connected: bool,
    queued_commands: usize,
}

impl StatusView {
    pub fn from_controller<O: RelayOutput>(controller: &ClimateController<O>) -> Self {
        let frame = controller.frame();
        Self {
            mode: frame.mode,
            hub_mode: frame.mode.hub_mode(),
            target_f: frame.setpoint.target_f,
            display_unit: frame.setpoint.display_unit.symbol(),
            display_setpoint: frame.display_setpoint(),
            temperature_f: frame.reading.map(|reading| reading.temperature_f),
            humidity: frame.reading.map(|reading| reading.humidity),
            display_temperature: frame.display_temperature(),
            stale: frame.stale,
            actual: frame.actual,
            pending: frame.pending,
            action: frame.action.as_str(),
            connected: controller.bridge().is_connected(),
            queued_commands: controller.queued_commands(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/mode", post(handle_set_mode))
        .route("/api/mode/next", post(handle_next_mode))
        .route("/api/target", post(handle_set_target))
        .route("/api/manual/{device}", post(handle_manual))
        .with_state(state)
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let controller = state.controller.lock().await;
    Json(StatusView::from_controller(&controller))
}

async fn handle_next_mode(State(state): State<AppState>) -> impl IntoResponse {
    submit(&state, Command::NextMode).await
}

async fn handle_set_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(mode) = Mode::parse(value) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid mode. Use off, auto, manual, heat, cool or fan",
        );
    };
    submit(&state, Command::SetMode(mode)).await
}

async fn handle_set_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(target) = value.trim().parse::<f32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    };

    let (min, max) = {
        let controller = state.controller.lock().await;
        let config = &controller.engine().config;
        (config.min_target_f, config.max_target_f)
    };
    if !target.is_finite() || !(min..=max).contains(&target) {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("Target must be between {min} and {max}"),
        );
    }

    submit(&state, Command::SetTarget(target)).await
}

async fn handle_manual(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(device) = Device::parse(&device) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown device");
    };
    let on = match params.get("value").map(|value| value.to_ascii_lowercase()) {
        Some(value) if value == "on" => true,
        Some(value) if value == "off" => false,
        _ => return error_response(StatusCode::BAD_REQUEST, "Use value=on or value=off"),
    };

    if state.controller.lock().await.engine().mode() != Mode::Manual {
        return error_response(
            StatusCode::CONFLICT,
            "Manual switching is only available in manual mode",
        );
    }

    submit(&state, Command::Switch { device, on }).await
}

/// Queue a local command and answer with the current status. The command
/// takes effect on the next control cycle.
async fn submit(state: &AppState, command: Command) -> axum::response::Response {
    let mut controller = state.controller.lock().await;
    match controller.submit(command, CommandSource::Local) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(StatusView::from_controller(&controller)),
        )
            .into_response(),
        Err(CommandError::QueueFull) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Command queue full")
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
