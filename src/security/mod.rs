//! Security module for shell-bridge.
//!
//! Every connection presents a shared-secret credential, either as an
//! `Authorization: Bearer` header or a `token` query parameter, and is
//! checked by the [`AuthGate`] before any session resource is allocated.
//!
//! ## Example
//!
//! ```rust
//! use shell_bridge::security::AuthGate;
//!
//! let gate = AuthGate::new(Some("my-secret".to_string()));
//! assert!(gate.check(Some("my-secret")).is_ok());
//! assert!(gate.check(Some("wrong")).is_err());
//! assert!(gate.check(None).is_err());
//! ```

pub mod auth;

pub use auth::{auth_middleware, extract_credential, AuthGate, BEARER_PREFIX, TOKEN_QUERY_PARAM};
