//! API router configuration and server.

use std::net::SocketAddr;

use axum::{
    middleware,
    routing::{any, delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::handlers::{
    api_info, delete_session, health, list_sessions, resize_session, signal_session, AppState,
};
use super::stream::stream_session;
use super::websocket::{control_handler, ws_handler};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::security::auth_middleware;

/// Create the API router for `bridge`.
///
/// Everything under `/api/v1` requires the shared secret; `/health` does not.
pub fn create_router(bridge: Bridge) -> Router {
    let auth = middleware::from_fn_with_state(bridge.clone(), auth_middleware);

    // Session routes
    let session_routes = Router::new()
        .route("/", get(list_sessions).post(stream_session))
        .route("/{id}", delete(delete_session))
        .route("/{id}/resize", post(resize_session))
        .route("/{id}/signal", post(signal_session));

    // API v1 routes
    let api_v1 = Router::new()
        .route("/", get(api_info))
        .route("/ws", any(ws_handler))
        .route("/control", any(control_handler))
        .nest("/sessions", session_routes)
        .route_layer(auth);

    // Build main router
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(AppState::new(bridge))
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
    /// Wait for Ctrl-C and close every session before exiting.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            graceful_shutdown: true,
        }
    }

    pub fn without_graceful_shutdown(mut self) -> Self {
        self.graceful_shutdown = false;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 3000)))
    }
}

/// Start the API server and run until shutdown.
///
/// With graceful shutdown enabled, Ctrl-C stops accepting connections and
/// every live session is terminated before this returns.
pub async fn serve(config: ServerConfig, bridge: Bridge) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(BridgeError::Io)?;

    info!(addr = %config.addr, "Starting shell-bridge API server");
    serve_on(listener, config.graceful_shutdown, bridge).await
}

/// Serve on an already bound listener.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    graceful_shutdown: bool,
    bridge: Bridge,
) -> crate::Result<()> {
    let router = create_router(bridge.clone());

    if graceful_shutdown {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(BridgeError::Io)?;
    } else {
        axum::serve(listener, router)
            .await
            .map_err(BridgeError::Io)?;
    }

    let closed = bridge.shutdown().await;
    info!(sessions = closed, "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
