//! # shell-bridge
//!
//! Tunnel interactive terminal sessions over HTTP and WebSocket.
//!
//! The session bridge authenticates an incoming connection, spawns a
//! process on a fresh pseudo-terminal, pumps bytes both ways for the life
//! of the session, applies out-of-band resize and signal events to the
//! right session, and tears everything down exactly once whichever side
//! ends first.
//!
//! ## Features
//!
//! - **Shared-secret auth**: checked before anything is allocated
//! - **Clean environment**: sessions start with only `PATH`, `HOME`, `TERM` and `SHELL`
//! - **Control plane**: resize and signal by session ID, inline or on a separate connection
//! - **Leak-free teardown**: hangup, grace period, then kill of the process group
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use shell_bridge::{Bridge, BridgeConfig, NativeSpawner, PtySize};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> shell_bridge::Result<()> {
//!     shell_bridge::logging::try_init(None).ok();
//!
//!     let config = BridgeConfig {
//!         secret: Some("tok-A".into()),
//!         ..BridgeConfig::default()
//!     };
//!     let bridge = Bridge::new(config, Arc::new(NativeSpawner::new()));
//!
//!     let connection = bridge.open(Some("tok-A"), Some(PtySize::new(24, 80)))?;
//!     println!("Session {} started", connection.id());
//!
//!     let (input, inbound) = mpsc::channel(16);
//!     let (outbound, mut output) = mpsc::channel(16);
//!     input.send(b"echo hi; exit\n".to_vec()).await.ok();
//!
//!     tokio::spawn(async move {
//!         while let Some(chunk) = output.recv().await {
//!             print!("{}", String::from_utf8_lossy(&chunk));
//!         }
//!     });
//!
//!     let outcome = connection.run(inbound, outbound).await;
//!     println!("exit code: {:?}", outcome.exit_code);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod pty;
pub mod pump;
pub mod security;
pub mod session;

// Re-export commonly used types
pub use bridge::{Admission, Bridge, BridgeConfig, Connection, SessionOutcome};
pub use control::{ControlDispatcher, ControlEvent, Dispatch};
pub use error::{BridgeError, Result};
pub use pty::{NativeSpawner, PtyProcess, PtySize, SignalKind, Spawn, SpawnSpec};
pub use pump::{Pump, PumpExit};
pub use session::{BridgeState, Session, SessionId, SessionInfo, SessionRegistry};
