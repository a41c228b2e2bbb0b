//! API request and response types.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::control::{ControlEvent, Dispatch};
use crate::error::BridgeError;
use crate::pty::{PtySize, SignalKind};
use crate::session::{SessionId, SessionInfo};

/// Terminal size requested through `?rows=&cols=`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SizeQuery {
    #[serde(default)]
    pub rows: Option<u16>,
    #[serde(default)]
    pub cols: Option<u16>,
}

impl SizeQuery {
    /// The requested size, with a missing side taken from `default`.
    pub fn size(&self, default: PtySize) -> Option<PtySize> {
        if self.rows.is_none() && self.cols.is_none() {
            return None;
        }
        Some(PtySize::new(
            self.rows.unwrap_or(default.rows),
            self.cols.unwrap_or(default.cols),
        ))
    }
}

/// Request to resize a session's terminal.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResizeRequest {
    pub rows: u16,
    pub cols: u16,
}

/// Request to signal a session's process.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SignalRequest {
    pub signal: SignalKind,
}

/// Response for a control request.
///
/// Control requests never fail: an unknown session is reported with
/// `applied: false`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ControlResponse {
    pub applied: bool,
    pub outcome: Dispatch,
}

impl From<Dispatch> for ControlResponse {
    fn from(outcome: Dispatch) -> Self {
        Self {
            applied: outcome == Dispatch::Applied,
            outcome,
        }
    }
}

/// List sessions response.
#[derive(Debug, Clone, Serialize)]
pub struct ListSessionsResponse {
    /// Total number of sessions.
    pub count: usize,
    pub sessions: Vec<SessionInfo>,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "SESSION_NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn session_not_found(id: &str) -> Self {
        Self::new("SESSION_NOT_FOUND", format!("Session '{}' not found", id))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    /// Map a bridge error to a response body.
    pub fn from_error(err: &BridgeError) -> Self {
        match err {
            BridgeError::SessionNotFound(id) => Self::session_not_found(id),
            BridgeError::InvalidSignal(_) => Self::bad_request(err.to_string()),
            _ => Self::new(error_code(err), err.to_string()),
        }
    }
}

/// Stable machine-readable code for an error.
pub fn error_code(err: &BridgeError) -> &'static str {
    match err {
        BridgeError::Unauthenticated => "UNAUTHENTICATED",
        BridgeError::Misconfigured => "MISCONFIGURED",
        BridgeError::SpawnFailed(_) => "SPAWN_FAILED",
        BridgeError::SessionNotFound(_) => "SESSION_NOT_FOUND",
        BridgeError::InvalidSignal(_) => "BAD_REQUEST",
        BridgeError::InvalidFrame(_) => "PARSE_ERROR",
        _ => "INTERNAL_ERROR",
    }
}

/// HTTP status for an error raised while handling a request.
pub fn error_status(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::Unauthenticated => StatusCode::UNAUTHORIZED,
        BridgeError::Misconfigured => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        BridgeError::InvalidSignal(_) | BridgeError::InvalidFrame(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// WebSocket text envelopes.
///
/// Binary frames carry raw terminal bytes; everything else travels as one
/// of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Client sends terminal input as text.
    Input { data: String },
    /// Client resizes the terminal.
    Resize { rows: u16, cols: u16 },
    /// Client signals the process.
    Signal { signal: SignalKind },
    /// Client binds a control connection to a session.
    Attach { session_id: SessionId },
    /// Server announces the session ID.
    Session { session_id: SessionId },
    /// Server reports that the process exited.
    Exit { code: Option<u32> },
    /// Error message.
    Error { code: String, message: String },
    /// Ping/pong for connection health.
    Ping,
    Pong,
}

impl WsMessage {
    /// The control event carried by this envelope, if any.
    pub fn control_event(&self) -> Option<ControlEvent> {
        match *self {
            Self::Resize { rows, cols } => Some(ControlEvent::Resize { rows, cols }),
            Self::Signal { signal } => Some(ControlEvent::Signal { signal }),
            _ => None,
        }
    }

    /// Error envelope for a bridge error.
    pub fn error(err: &BridgeError) -> Self {
        Self::Error {
            code: error_code(err).to_string(),
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        // Every variant is plain data; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
