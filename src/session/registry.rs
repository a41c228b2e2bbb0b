//! Session registry: the one structure shared by every connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::SessionId;
use crate::error::BridgeError;
use crate::pty::{PtyProcess, PtySize, SignalKind};
use crate::Result;

/// A live terminal session: one process on one pseudo-terminal.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier.
    pub id: SessionId,
    process: PtyProcess,
    dimensions: Mutex<PtySize>,
    created_at: Instant,
    closing: AtomicBool,
}

impl Session {
    fn new(id: SessionId, process: PtyProcess, dimensions: PtySize) -> Self {
        Self {
            id,
            process,
            dimensions: Mutex::new(dimensions),
            created_at: Instant::now(),
            closing: AtomicBool::new(false),
        }
    }

    /// The backing process.
    pub fn process(&self) -> &PtyProcess {
        &self.process
    }

    /// Last dimensions applied to the terminal.
    pub fn dimensions(&self) -> PtySize {
        *self
            .dimensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resize the terminal and record the new dimensions.
    ///
    /// The dimensions lock is held across the PTY call so concurrent
    /// resizes for one session apply in the order they acquire it.
    pub fn resize(&self, size: PtySize) -> Result<()> {
        let mut dimensions = self
            .dimensions
            .lock()
            .map_err(|_| BridgeError::LockPoisoned)?;
        self.process.resize(size)?;
        *dimensions = size;
        Ok(())
    }

    /// Forward a signal to the process.
    pub fn signal(&self, kind: SignalKind) -> Result<()> {
        self.process.signal(kind)
    }

    /// Whether teardown has started; control events are refused from then on.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Claim the right to tear this session down.
    ///
    /// Returns `true` for exactly one caller.
    pub fn begin_close(&self) -> bool {
        self.closing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Time since the session was registered.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Diagnostic snapshot.
    pub fn info(&self) -> SessionInfo {
        let dimensions = self.dimensions();
        SessionInfo {
            session_id: self.id,
            pid: self.process.pid(),
            rows: dimensions.rows,
            cols: dimensions.cols,
            age_seconds: self.age().as_secs_f64(),
            closing: self.is_closing(),
        }
    }
}

/// Diagnostic view of a registered session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub rows: u16,
    pub cols: u16,
    pub age_seconds: f64,
    pub closing: bool,
}

#[derive(Debug)]
enum Slot {
    /// ID handed out, process not started yet.
    Reserved,
    Attached(Arc<Session>),
}

/// Thread-safe map from session ID to session.
///
/// Locks are held only for the map operation itself, never across I/O, so
/// unrelated sessions do not contend. Reserved IDs are invisible to
/// [`lookup`](Self::lookup) until a process is attached.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Slot>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh session ID.
    pub fn create(&self) -> Result<SessionId> {
        let id = SessionId::new();
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| BridgeError::LockPoisoned)?;

        if sessions.contains_key(&id) {
            return Err(BridgeError::SessionExists(id.to_string()));
        }
        sessions.insert(id, Slot::Reserved);
        Ok(id)
    }

    /// Bind a started process to a reserved ID.
    ///
    /// Fails if the reservation is gone or already bound; the process is
    /// then dropped, which kills it.
    pub fn attach(&self, id: SessionId, process: PtyProcess, size: PtySize) -> Result<Arc<Session>> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| BridgeError::LockPoisoned)?;

        match sessions.get(&id) {
            Some(Slot::Reserved) => {
                let session = Arc::new(Session::new(id, process, size));
                sessions.insert(id, Slot::Attached(Arc::clone(&session)));
                debug!(session_id = %id, "Session attached");
                Ok(session)
            }
            Some(Slot::Attached(_)) => Err(BridgeError::SessionExists(id.to_string())),
            None => Err(BridgeError::SessionNotFound(id.to_string())),
        }
    }

    /// Find an attached session.
    pub fn lookup(&self, id: &SessionId) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(id) {
            Some(Slot::Attached(session)) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Remove an ID, reserved or attached.
    ///
    /// Idempotent: a second call for the same ID returns `None`.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.remove(id) {
            Some(Slot::Attached(session)) => Some(session),
            _ => None,
        }
    }

    /// Check if an attached session exists.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.lookup(id).is_some()
    }

    /// Get the number of attached sessions.
    pub fn count(&self) -> usize {
        self.sessions
            .read()
            .map(|s| s.values().filter(|slot| matches!(slot, Slot::Attached(_))).count())
            .unwrap_or(0)
    }

    /// All attached sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut attached: Vec<_> = sessions
            .values()
            .filter_map(|slot| match slot {
                Slot::Attached(session) => Some(Arc::clone(session)),
                Slot::Reserved => None,
            })
            .collect();
        attached.sort_by_key(|s| s.id);
        attached
    }

    /// Diagnostic listing of attached sessions, oldest first.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions().iter().map(|s| s.info()).collect()
    }
}
