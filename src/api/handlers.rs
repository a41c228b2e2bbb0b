//! REST API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::types::{ControlResponse, ErrorResponse, ListSessionsResponse, ResizeRequest, SignalRequest};
use crate::bridge::Bridge;
use crate::control::{ControlEvent, Dispatch};
use crate::session::SessionId;

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub bridge: Bridge,
}

impl AppState {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "shell-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "sessions": state.bridge.registry().count(),
    }))
}

/// List live sessions.
pub async fn list_sessions(State(state): State<AppState>) -> Json<ListSessionsResponse> {
    let sessions = state.bridge.sessions();
    Json(ListSessionsResponse {
        count: sessions.len(),
        sessions,
    })
}

/// Explicitly disconnect a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::session_not_found(&session_id)),
        )
    };

    let id: SessionId = session_id.parse().map_err(|_| not_found())?;
    if state.bridge.terminate(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

/// Resize a session's terminal.
pub async fn resize_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<ResizeRequest>,
) -> Json<ControlResponse> {
    let event = ControlEvent::Resize {
        rows: req.rows,
        cols: req.cols,
    };
    Json(dispatch(&state, &session_id, event).into())
}

/// Forward a signal to a session's process.
pub async fn signal_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SignalRequest>,
) -> Json<ControlResponse> {
    let event = ControlEvent::Signal { signal: req.signal };
    Json(dispatch(&state, &session_id, event).into())
}

/// A malformed ID cannot name a live session; it is dropped like an unknown one.
fn dispatch(state: &AppState, session_id: &str, event: ControlEvent) -> Dispatch {
    match session_id.parse() {
        Ok(id) => state.bridge.dispatcher().dispatch(id, event),
        Err(_) => Dispatch::Dropped,
    }
}
