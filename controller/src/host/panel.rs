//! Front panel over HTTP: buttons, the motion line, and read-outs of the
//! simulated display and relays.

use std::sync::{atomic::Ordering, Arc, PoisonError};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use thermostat_core::{Event, Frame};

use super::HostShared;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct DisplayView {
    powered: bool,
    frame: Option<Frame>,
}

pub fn router(shared: Arc<HostShared>) -> Router {
    Router::new()
        .route("/api/input/{action}", post(handle_input))
        .route("/api/motion/{state}", post(handle_motion))
        .route("/api/display", get(handle_get_display))
        .route("/api/equipment", get(handle_get_equipment))
        .with_state(shared)
}

fn input_event(action: &str) -> Option<Event> {
    match action {
        "cw" => Some(Event::OledRotaryCw),
        "ccw" => Some(Event::OledRotaryCcw),
        "press" => Some(Event::OledEditMenu),
        "next" => Some(Event::OledNextMenu),
        "prev" => Some(Event::OledPrevMenu),
        "self-test" => Some(Event::SelfTest),
        _ => None,
    }
}

async fn handle_input(
    State(shared): State<Arc<HostShared>>,
    Path(action): Path<String>,
) -> impl IntoResponse {
    let Some(event) = input_event(&action) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown input");
    };
    shared.interrupt(event);
    StatusCode::ACCEPTED.into_response()
}

async fn handle_motion(
    State(shared): State<Arc<HostShared>>,
    Path(state): Path<String>,
) -> impl IntoResponse {
    match state.as_str() {
        "on" => {
            shared.motion.store(true, Ordering::Relaxed);
            shared.interrupt(Event::MotionDetected);
        }
        "off" => shared.motion.store(false, Ordering::Relaxed),
        _ => return error_response(StatusCode::BAD_REQUEST, "Use 'on' or 'off'"),
    }
    StatusCode::ACCEPTED.into_response()
}

async fn handle_get_display(State(shared): State<Arc<HostShared>>) -> impl IntoResponse {
    let frame = shared
        .frame
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Json(DisplayView {
        powered: shared.screen_on.load(Ordering::Relaxed),
        frame,
    })
}

async fn handle_get_equipment(State(shared): State<Arc<HostShared>>) -> impl IntoResponse {
    Json(shared.outputs())
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
