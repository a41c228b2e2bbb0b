//! Session bridge: authenticate, spawn, pump, tear down.
//!
//! A [`Bridge`] is shared by every transport binding. Each incoming
//! connection is first admitted by [`Bridge::authenticate`]; the resulting
//! [`Admission`] either fails to open before any process exists or hands
//! back a [`Connection`] whose session is already registered.
//! [`Connection::run`] then pumps bytes until one side ends and guarantees
//! the session is torn down exactly once.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::control::ControlDispatcher;
use crate::error::BridgeError;
use crate::pty::{PtySize, Spawn, SpawnSpec, DEFAULT_KILL_GRACE};
use crate::pump::{Pump, PumpExit};
use crate::security::AuthGate;
use crate::session::{BridgeState, Session, SessionId, SessionInfo, SessionRegistry};
use crate::Result;

/// Runtime settings for a [`Bridge`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Shared secret every connection must present.
    pub secret: Option<String>,
    /// Template for spawned processes; its size is the default terminal size.
    pub spawn: SpawnSpec,
    /// How long a hung-up process gets before it is killed.
    pub kill_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            secret: None,
            spawn: SpawnSpec::default(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Result of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub id: SessionId,
    /// Which side ended the session.
    pub exit: PumpExit,
    /// Exit code, if the process was reaped.
    pub exit_code: Option<u32>,
}

impl SessionOutcome {
    /// The ordinary termination this outcome represents.
    pub fn reason(&self) -> BridgeError {
        if self.exit.is_process_side() {
            BridgeError::ProcessExited(self.exit_code)
        } else {
            BridgeError::TransportClosed
        }
    }
}

/// Orchestrates sessions over a shared registry. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    gate: Arc<AuthGate>,
    registry: Arc<SessionRegistry>,
    spawner: Arc<dyn Spawn>,
    template: Arc<SpawnSpec>,
    kill_grace: Duration,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("gate", &self.gate)
            .field("sessions", &self.registry.count())
            .field("program", &self.template.program)
            .field("kill_grace", &self.kill_grace)
            .finish()
    }
}

impl Bridge {
    /// Create a bridge that spawns through `spawner`.
    pub fn new(config: BridgeConfig, spawner: Arc<dyn Spawn>) -> Self {
        Self {
            gate: Arc::new(AuthGate::new(config.secret)),
            registry: Arc::new(SessionRegistry::new()),
            spawner,
            template: Arc::new(config.spawn),
            kill_grace: config.kill_grace,
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// A control dispatcher over this bridge's sessions.
    pub fn dispatcher(&self) -> ControlDispatcher {
        ControlDispatcher::new(Arc::clone(&self.registry))
    }

    /// Terminal size used when a connection does not ask for one.
    pub fn default_size(&self) -> PtySize {
        self.template.size
    }

    /// Diagnostic listing of live sessions.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.list()
    }

    /// Authenticate and start a session.
    ///
    /// Shorthand for [`authenticate`](Self::authenticate) followed by
    /// [`Admission::open`].
    pub fn open(&self, credential: Option<&str>, size: Option<PtySize>) -> Result<Connection> {
        self.authenticate(credential)?.open(size)
    }

    /// Check a credential without allocating anything.
    ///
    /// The returned [`Admission`] is the only way to spawn a session, so no
    /// process can start for a connection that has not passed the gate.
    pub fn authenticate(&self, credential: Option<&str>) -> Result<Admission> {
        let mut state = BridgeState::Connecting;
        state.transition_to(BridgeState::Authenticating)?;

        if let Err(e) = self.gate.check(credential) {
            state.transition_to(BridgeState::Closed)?;
            return Err(e);
        }

        Ok(Admission {
            bridge: self.clone(),
            state,
        })
    }

    #[allow(clippy::type_complexity)]
    fn start(
        &self,
        id: SessionId,
        size: PtySize,
    ) -> Result<(Arc<Session>, Box<dyn Read + Send>, Box<dyn Write + Send>)> {
        let spec = self.template.as_ref().clone().with_size(size);
        let process = self.spawner.spawn(&spec)?;
        let reader = process.take_reader()?;
        let writer = process.take_writer()?;
        let session = self.registry.attach(id, process, size)?;
        Ok((session, reader, writer))
    }

    /// Tear a session down.
    ///
    /// Stops control delivery, releases the terminal, makes sure the
    /// process is gone, then drops the registry entry. Only the first call
    /// per session does anything; it returns `true`.
    pub async fn teardown(&self, session: &Session) -> bool {
        if !session.begin_close() {
            return false;
        }

        session.process().close(self.kill_grace).await;
        self.registry.remove(&session.id);

        info!(
            session_id = %session.id,
            age_ms = session.age().as_millis() as u64,
            "Session closed"
        );
        true
    }

    /// Explicitly disconnect a session. Returns `false` for an unknown ID.
    pub async fn terminate(&self, id: &SessionId) -> bool {
        let Some(session) = self.registry.lookup(id) else {
            return false;
        };
        debug!(session_id = %id, "Terminating session");
        self.teardown(&session).await;
        true
    }

    /// Tear down every live session. Returns how many were closed here.
    pub async fn shutdown(&self) -> usize {
        let sessions = self.registry.sessions();
        if sessions.is_empty() {
            return 0;
        }

        info!(count = sessions.len(), "Terminating all sessions");
        join_all(sessions.iter().map(|s| self.teardown(s)))
            .await
            .into_iter()
            .filter(|closed| *closed)
            .count()
    }
}

/// Proof that a connection passed authentication.
#[derive(Debug, Clone)]
pub struct Admission {
    bridge: Bridge,
    state: BridgeState,
}

impl Admission {
    /// Reserve an ID, spawn the process and register the session.
    ///
    /// An invalid or absent `size` falls back to the configured default.
    /// A spawn failure releases the reservation, so a failed open leaves
    /// nothing behind.
    pub fn open(self, size: Option<PtySize>) -> Result<Connection> {
        let Admission { bridge, mut state } = self;

        state.transition_to(BridgeState::Spawning)?;
        let size = size
            .filter(PtySize::is_valid)
            .unwrap_or(bridge.template.size);
        let id = bridge.registry.create()?;

        match bridge.start(id, size) {
            Ok((session, reader, writer)) => {
                state.transition_to(BridgeState::Active)?;
                info!(
                    session_id = %id,
                    pid = ?session.process().pid(),
                    rows = size.rows,
                    cols = size.cols,
                    "Session active"
                );
                Ok(Connection {
                    guard: SessionGuard { bridge, session },
                    reader,
                    writer,
                    state,
                })
            }
            Err(e) => {
                bridge.registry.remove(&id);
                state.transition_to(BridgeState::Closed)?;
                warn!(session_id = %id, error = %e, "Session failed to start");
                Err(e)
            }
        }
    }
}

/// Releases the session if a connection is dropped without finishing.
struct SessionGuard {
    bridge: Bridge,
    session: Arc<Session>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // A teardown cancelled part way has already claimed `begin_close`,
        // so removal cannot depend on it. Once unregistered, the last
        // reference goes with this guard and dropping the process kills it.
        self.session.begin_close();
        if self.bridge.registry.remove(&self.session.id).is_some() {
            debug!(session_id = %self.session.id, "Session abandoned");
        }
    }
}

/// An authenticated, registered session waiting to be pumped.
pub struct Connection {
    guard: SessionGuard,
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    state: BridgeState,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.guard.session)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Session ID, available before any byte flows.
    pub fn id(&self) -> SessionId {
        self.guard.session.id
    }

    /// The registered session.
    pub fn session(&self) -> &Arc<Session> {
        &self.guard.session
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Pump bytes until either side ends, then tear down.
    ///
    /// `inbound` carries transport bytes for the process; dropping its
    /// sender closes the session. Output is sent to `outbound` until the
    /// terminal is drained. If the returned future is dropped early the
    /// session is still released.
    pub async fn run(
        self,
        inbound: mpsc::Receiver<Vec<u8>>,
        outbound: mpsc::Sender<Vec<u8>>,
    ) -> SessionOutcome {
        let Connection {
            guard,
            reader,
            writer,
            mut state,
        } = self;
        let (bridge, session) = (&guard.bridge, &guard.session);

        let exit = Pump::new(reader, writer)
            .run(
                inbound,
                outbound,
                async move {
                    session.process().wait().await;
                },
                move |exit| async move {
                    debug!(session_id = %session.id, exit = ?exit, "Session ending");
                    bridge.teardown(session).await;
                },
            )
            .await;

        for next in [BridgeState::Closing, BridgeState::Closed] {
            if let Err(e) = state.transition_to(next) {
                warn!(session_id = %session.id, error = %e, "Unexpected session state");
            }
        }

        let exit_code = if session.process().has_exited() {
            session.process().wait().await
        } else {
            None
        };

        SessionOutcome {
            id: session.id,
            exit,
            exit_code,
        }
    }
}
