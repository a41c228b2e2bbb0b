//! Signals that may be forwarded to a session's process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Interrupt/quit/terminate-class signals a remote peer may forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SignalKind {
    /// Ctrl-C.
    Interrupt,
    /// Ctrl-\.
    Quit,
    /// Polite termination request.
    Terminate,
    /// Terminal hangup.
    Hangup,
    /// Unconditional kill.
    Kill,
}

impl SignalKind {
    /// Canonical `SIG*` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Quit => "SIGQUIT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
            Self::Kill => "SIGKILL",
        }
    }

    /// Native signal number.
    #[cfg(unix)]
    pub fn as_raw(&self) -> libc::c_int {
        match self {
            Self::Interrupt => libc::SIGINT,
            Self::Quit => libc::SIGQUIT,
            Self::Terminate => libc::SIGTERM,
            Self::Hangup => libc::SIGHUP,
            Self::Kill => libc::SIGKILL,
        }
    }

    /// Whether delivering this signal is expected to end the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Terminate | Self::Kill)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignalKind {
    type Err = BridgeError;

    /// Accepts `SIGINT`, `INT`, `int`, and `interrupt` style spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
        match bare {
            "INT" | "INTERRUPT" => Ok(Self::Interrupt),
            "QUIT" => Ok(Self::Quit),
            "TERM" | "TERMINATE" => Ok(Self::Terminate),
            "HUP" | "HANGUP" => Ok(Self::Hangup),
            "KILL" => Ok(Self::Kill),
            _ => Err(BridgeError::InvalidSignal(s.to_string())),
        }
    }
}

impl TryFrom<String> for SignalKind {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SignalKind> for &'static str {
    fn from(kind: SignalKind) -> Self {
        kind.name()
    }
}
