//! Control event dispatch.
//!
//! Control events (resize, signal) are addressed by session ID and may
//! arrive inline on the data connection or on a separate one. Either way
//! they end up here: look the session up, apply the mutation, and never
//! fail the caller. An unknown ID is an expected race with teardown and is
//! dropped silently.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::pty::{PtySize, SignalKind};
use crate::session::{SessionId, SessionRegistry};

/// An out-of-band mutation for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    /// Change the terminal dimensions.
    Resize { rows: u16, cols: u16 },
    /// Forward a signal to the process.
    Signal { signal: SignalKind },
}

/// What became of a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    /// The mutation was applied.
    Applied,
    /// The session exists but the mutation could not be applied.
    Failed,
    /// No live session has this ID.
    Dropped,
}

impl Dispatch {
    /// Whether the event reached a live session.
    pub fn reached_session(&self) -> bool {
        !matches!(self, Self::Dropped)
    }
}

/// Applies control events to sessions in the registry.
#[derive(Debug, Clone)]
pub struct ControlDispatcher {
    registry: Arc<SessionRegistry>,
}

impl ControlDispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Apply one event.
    ///
    /// Never returns an error: failures are logged and reported as
    /// [`Dispatch::Failed`], unknown or closing sessions as
    /// [`Dispatch::Dropped`].
    pub fn dispatch(&self, id: SessionId, event: ControlEvent) -> Dispatch {
        let Some(session) = self.registry.lookup(&id) else {
            debug!(session_id = %id, event = ?event, "Dropping control event for unknown session");
            return Dispatch::Dropped;
        };
        if session.is_closing() {
            debug!(session_id = %id, event = ?event, "Dropping control event for closing session");
            return Dispatch::Dropped;
        }

        let result = match event {
            ControlEvent::Resize { rows, cols } => session.resize(PtySize::new(rows, cols)),
            ControlEvent::Signal { signal } => session.signal(signal),
        };

        match result {
            Ok(()) => {
                trace!(session_id = %id, event = ?event, "Control event applied");
                Dispatch::Applied
            }
            Err(e) => {
                warn!(session_id = %id, event = ?event, error = %e, "Control event failed");
                Dispatch::Failed
            }
        }
    }

    /// Drain a stream of events in arrival order until every sender is gone.
    ///
    /// Returns how many events reached a live session.
    pub async fn run(&self, mut events: mpsc::Receiver<(SessionId, ControlEvent)>) -> usize {
        let mut delivered = 0;
        while let Some((id, event)) = events.recv().await {
            if self.dispatch(id, event).reached_session() {
                delivered += 1;
            }
        }
        delivered
    }
}
