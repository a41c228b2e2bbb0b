//! Session management module.
//!
//! This module provides session identification, the per-connection state
//! machine, and the registry that maps IDs to live sessions.

mod id;
mod registry;
mod state;

pub use id::SessionId;
pub use registry::{Session, SessionInfo, SessionRegistry};
pub use state::BridgeState;
