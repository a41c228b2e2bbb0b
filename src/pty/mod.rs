//! PTY (Pseudo-Terminal) process management.
//!
//! This module owns everything platform-specific about a session's process:
//! allocating the pseudo-terminal, building a minimal environment, spawning
//! the command, resizing, delivering signals, waiting for exit, and tearing
//! the process down. It supports both Unix PTY and Windows ConPTY through
//! portable-pty.

mod async_adapter;
mod native;
mod signal;
mod spec;

pub use async_adapter::{AsyncPtyReader, AsyncPtyWriter};
pub use native::{NativeSpawner, PtyProcess, DEFAULT_KILL_GRACE};
pub use signal::SignalKind;
pub use spec::{default_shell, SpawnSpec, DEFAULT_PATH, DEFAULT_TERM};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Size of a PTY in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtySize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl PtySize {
    /// Create a new PtySize with the given dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// A zero dimension cannot be applied to a terminal.
    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.cols > 0
    }
}

impl Default for PtySize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

impl From<PtySize> for portable_pty::PtySize {
    fn from(size: PtySize) -> Self {
        portable_pty::PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl From<portable_pty::PtySize> for PtySize {
    fn from(size: portable_pty::PtySize) -> Self {
        Self {
            rows: size.rows,
            cols: size.cols,
        }
    }
}

/// Something that can start a process attached to a fresh pseudo-terminal.
///
/// The bridge only ever spawns through this trait, which keeps the platform
/// facility swappable and lets callers observe whether a spawn happened.
pub trait Spawn: Send + Sync {
    /// Start `spec` on a new PTY sized to `spec.size`.
    fn spawn(&self, spec: &SpawnSpec) -> Result<PtyProcess>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_size_default() {
        let size = PtySize::default();
        assert_eq!(size.rows, 24);
        assert_eq!(size.cols, 80);
    }

    #[test]
    fn test_pty_size_new() {
        let size = PtySize::new(40, 120);
        assert_eq!(size.rows, 40);
        assert_eq!(size.cols, 120);
    }

    #[test]
    fn test_pty_size_validity() {
        assert!(PtySize::new(1, 1).is_valid());
        assert!(!PtySize::new(0, 80).is_valid());
        assert!(!PtySize::new(24, 0).is_valid());
    }

    #[test]
    fn test_native_size_conversion() {
        let native: portable_pty::PtySize = PtySize::new(40, 120).into();
        assert_eq!(native.rows, 40);
        assert_eq!(native.cols, 120);
        assert_eq!(native.pixel_width, 0);

        let back: PtySize = native.into();
        assert_eq!(back, PtySize::new(40, 120));
    }

    #[test]
    fn test_pty_size_deserialize() {
        let size: PtySize = serde_json::from_str(r#"{"rows": 40, "cols": 120}"#).unwrap();
        assert_eq!(size, PtySize::new(40, 120));
    }
}
