//! API layer for shell-bridge.
//!
//! HTTP and WebSocket bindings over a shared [`Bridge`](crate::bridge::Bridge).
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check (no credential needed)
//! - `GET /api/v1` - API information
//!
//! ### Data
//! - `WS /api/v1/ws?rows=&cols=` - One session per socket. The first
//!   server message is `{"type":"session","session_id":"sess-…"}`; binary
//!   frames carry terminal bytes both ways.
//! - `POST /api/v1/sessions?rows=&cols=` - Request body is stdin, response
//!   body is output; the ID comes back in `x-session-id`.
//!
//! ### Control
//! - `WS /api/v1/control` - `attach`, then `resize`/`signal` envelopes
//! - `POST /api/v1/sessions/{id}/resize` - `{"rows":…,"cols":…}`
//! - `POST /api/v1/sessions/{id}/signal` - `{"signal":"SIGINT"}`
//! - `DELETE /api/v1/sessions/{id}` - Disconnect a session
//! - `GET /api/v1/sessions` - List live sessions
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shell_bridge::api::{serve, ServerConfig};
//! use shell_bridge::{Bridge, BridgeConfig, NativeSpawner};
//!
//! #[tokio::main]
//! async fn main() -> shell_bridge::Result<()> {
//!     let config = BridgeConfig {
//!         secret: Some("my-secret".into()),
//!         ..BridgeConfig::default()
//!     };
//!     let bridge = Bridge::new(config, Arc::new(NativeSpawner::new()));
//!     serve(ServerConfig::default(), bridge).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod stream;
pub mod types;
pub mod websocket;

// Re-export commonly used types
pub use handlers::AppState;
pub use router::{create_router, serve, serve_on, ServerConfig};
pub use stream::SESSION_ID_HEADER;
pub use types::{
    ControlResponse, ErrorResponse, ListSessionsResponse, ResizeRequest, SignalRequest, SizeQuery,
    WsMessage,
};
