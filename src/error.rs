//! Error types for shell-bridge.

use thiserror::Error;

/// Main error type for shell-bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The presented credential was missing, empty, or did not match.
    #[error("unauthenticated")]
    Unauthenticated,

    /// No shared secret has been configured.
    #[error("authentication is misconfigured: no secret configured")]
    Misconfigured,

    /// The pseudo-terminal or the process could not be created.
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    /// Session with the given ID was not found.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Session with the given ID is already bound to a process.
    #[error("session already exists: {0}")]
    SessionExists(String),

    /// The transport side of a session closed.
    #[error("transport closed")]
    TransportClosed,

    /// The process side of a session exited.
    #[error("process exited (code {0:?})")]
    ProcessExited(Option<u32>),

    /// PTY handle error after the process started.
    #[error("PTY error: {0}")]
    Pty(String),

    /// A resize could not be applied.
    #[error("resize failed: {0}")]
    ResizeFailed(String),

    /// A signal could not be delivered.
    #[error("signal failed: {0}")]
    SignalFailed(String),

    /// A signal name could not be parsed.
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    /// A transport frame could not be decoded.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Invalid connection state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::BridgeState,
        to: crate::session::BridgeState,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl BridgeError {
    /// Whether this error happened while establishing a session.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::Misconfigured | Self::SpawnFailed(_)
        )
    }
}

/// Convenience Result type for shell-bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_display() {
        let err = BridgeError::SessionNotFound("sess-00000001".into());
        assert!(err.to_string().contains("sess-00000001"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BridgeError = io_err.into();
        assert!(matches!(err, BridgeError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_spawn_failed_display() {
        let err = BridgeError::SpawnFailed("no such file".into());
        assert!(err.to_string().contains("spawn failed"));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(BridgeError::TransportClosed.to_string(), "transport closed");
        assert_eq!(
            BridgeError::ProcessExited(Some(3)).to_string(),
            "process exited (code Some(3))"
        );
    }

    #[test]
    fn test_setup_failure() {
        assert!(BridgeError::Unauthenticated.is_setup_failure());
        assert!(BridgeError::Misconfigured.is_setup_failure());
        assert!(BridgeError::SpawnFailed("x".into()).is_setup_failure());
        assert!(!BridgeError::SessionNotFound("x".into()).is_setup_failure());
    }
}
