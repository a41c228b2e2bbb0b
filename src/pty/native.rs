//! Native PTY implementation using portable-pty.

use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::Duration;

use portable_pty::{native_pty_system, Child, ChildKiller, MasterPty};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{PtySize, SignalKind, Spawn, SpawnSpec};
use crate::error::BridgeError;
use crate::Result;

/// How long a hung-up process gets to exit before it is killed.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// How long to wait for the waiter thread to reap a killed process.
const REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Poll interval while waiting for the rest of a process group to exit.
#[cfg(unix)]
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitState {
    Running,
    Exited(Option<u32>),
}

/// Spawns processes on the platform's native PTY facility.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSpawner;

impl NativeSpawner {
    /// Create a new NativeSpawner.
    pub fn new() -> Self {
        Self
    }
}

impl Spawn for NativeSpawner {
    fn spawn(&self, spec: &SpawnSpec) -> Result<PtyProcess> {
        // Dimensions are fixed at allocation, before the child can write anything.
        let pair = native_pty_system()
            .openpty(spec.size.into())
            .map_err(|e| BridgeError::SpawnFailed(e.to_string()))?;

        let child = pair
            .slave
            .spawn_command(spec.to_command())
            .map_err(|e| BridgeError::SpawnFailed(format!("{}: {}", spec.program, e)))?;

        // Our copy of the slave must go, otherwise reads never see EOF once the child exits.
        drop(pair.slave);

        let process = PtyProcess::start(pair.master, child)?;

        info!(
            pid = ?process.pid(),
            program = %spec.program,
            rows = spec.size.rows,
            cols = spec.size.cols,
            "Spawned PTY process"
        );

        Ok(process)
    }
}

/// A live process attached to a pseudo-terminal.
///
/// The child itself is owned by a waiter thread that reaps it and publishes
/// the exit code, so waiting never holds a lock that signalling or
/// resizing needs. Dropping a `PtyProcess` whose child is still running
/// kills the child's process group.
pub struct PtyProcess {
    pid: Option<u32>,
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    exit_rx: watch::Receiver<ExitState>,
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess")
            .field("pid", &self.pid)
            .field("exited", &self.has_exited())
            .finish_non_exhaustive()
    }
}

impl PtyProcess {
    fn start(
        master: Box<dyn MasterPty + Send>,
        mut child: Box<dyn Child + Send + Sync>,
    ) -> Result<Self> {
        let pid = child.process_id();
        let killer = child.clone_killer();
        let (exit_tx, exit_rx) = watch::channel(ExitState::Running);

        let waiter = std::thread::Builder::new()
            .name(format!("pty-wait-{}", pid.unwrap_or(0)))
            .spawn(move || {
                let code = match child.wait() {
                    Ok(status) => Some(status.exit_code()),
                    Err(e) => {
                        warn!(error = %e, "Failed to wait for PTY child");
                        None
                    }
                };
                debug!(pid = ?pid, code = ?code, "PTY child exited");
                let _ = exit_tx.send(ExitState::Exited(code));
            });

        let process = Self {
            pid,
            master: Mutex::new(Some(master)),
            killer: Mutex::new(killer),
            exit_rx,
        };

        if let Err(e) = waiter {
            // Nobody would ever reap the child; take it down with us.
            process.force_kill();
            return Err(BridgeError::SpawnFailed(format!(
                "failed to start waiter thread: {e}"
            )));
        }

        Ok(process)
    }

    /// Process ID of the spawned child, if the platform reports one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the child has been reaped.
    pub fn has_exited(&self) -> bool {
        matches!(*self.exit_rx.borrow(), ExitState::Exited(_))
    }

    /// Wait until the child exits and return its exit code.
    ///
    /// Returns `None` when the code could not be determined.
    pub async fn wait(&self) -> Option<u32> {
        let mut rx = self.exit_rx.clone();
        let state = match rx
            .wait_for(|state| matches!(state, ExitState::Exited(_)))
            .await
        {
            Ok(state) => *state,
            Err(_) => return None,
        };
        match state {
            ExitState::Exited(code) => code,
            ExitState::Running => None,
        }
    }

    /// Open a reader on the terminal output.
    pub fn take_reader(&self) -> Result<Box<dyn Read + Send>> {
        let master = self.master.lock().map_err(|_| BridgeError::LockPoisoned)?;
        master
            .as_ref()
            .ok_or_else(|| BridgeError::Pty("terminal already closed".into()))?
            .try_clone_reader()
            .map_err(|e| BridgeError::Pty(e.to_string()))
    }

    /// Take the writer for terminal input (can only be called once).
    pub fn take_writer(&self) -> Result<Box<dyn Write + Send>> {
        let master = self.master.lock().map_err(|_| BridgeError::LockPoisoned)?;
        master
            .as_ref()
            .ok_or_else(|| BridgeError::Pty("terminal already closed".into()))?
            .take_writer()
            .map_err(|e| BridgeError::Pty(e.to_string()))
    }

    /// Apply new terminal dimensions.
    ///
    /// A no-op once the process has exited or the terminal was closed.
    pub fn resize(&self, size: PtySize) -> Result<()> {
        if !size.is_valid() {
            return Err(BridgeError::ResizeFailed(format!(
                "invalid dimensions {}x{}",
                size.rows, size.cols
            )));
        }
        if self.has_exited() {
            debug!(pid = ?self.pid, "Ignoring resize for exited process");
            return Ok(());
        }

        let master = self.master.lock().map_err(|_| BridgeError::LockPoisoned)?;
        match master.as_ref() {
            Some(master) => master
                .resize(size.into())
                .map_err(|e| BridgeError::ResizeFailed(e.to_string())),
            None => Ok(()),
        }
    }

    /// Current terminal dimensions as reported by the OS.
    ///
    /// `None` once the terminal has been closed.
    pub fn size(&self) -> Option<PtySize> {
        let master = self.master.lock().ok()?;
        master.as_ref()?.get_size().ok().map(PtySize::from)
    }

    /// Deliver a signal to the child's process group.
    ///
    /// A no-op once the process has exited. On platforms without POSIX
    /// signals only fatal kinds are honoured (by terminating the child); the
    /// others are ignored.
    pub fn signal(&self, kind: SignalKind) -> Result<()> {
        if self.has_exited() {
            debug!(pid = ?self.pid, signal = %kind, "Ignoring signal for exited process");
            return Ok(());
        }

        #[cfg(unix)]
        {
            let Some(pid) = self.pid else {
                return Err(BridgeError::SignalFailed("unknown process id".into()));
            };
            match signal_group(pid, kind.as_raw()) {
                Ok(()) => Ok(()),
                Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Ok(()),
                Err(e) => Err(BridgeError::SignalFailed(format!("{kind}: {e}"))),
            }
        }

        #[cfg(not(unix))]
        {
            if kind.is_fatal() {
                let mut killer = self.killer.lock().map_err(|_| BridgeError::LockPoisoned)?;
                killer
                    .kill()
                    .map_err(|e| BridgeError::SignalFailed(format!("{kind}: {e}")))?;
            } else {
                debug!(signal = %kind, "Signal not supported on this platform");
            }
            Ok(())
        }
    }

    /// Release the terminal and make sure the process is gone.
    ///
    /// The whole process group is hung up, including descendants left
    /// behind by a leader that already exited, since any of them can hold
    /// the terminal open. Whatever is still running after `grace` is
    /// killed. Safe to call more than once.
    pub async fn close(&self, grace: Duration) {
        if let Ok(mut master) = self.master.lock() {
            master.take();
        }

        let deadline = tokio::time::Instant::now() + grace;
        self.hangup_group();

        let leader_gone = tokio::time::timeout_at(deadline, self.wait()).await.is_ok();
        if leader_gone && self.wait_for_group(deadline).await {
            return;
        }

        warn!(pid = ?self.pid, grace_ms = grace.as_millis() as u64, "Process ignored hangup, killing");
        self.force_kill();

        if tokio::time::timeout(REAP_TIMEOUT, self.wait()).await.is_err() {
            warn!(pid = ?self.pid, "Process not reaped after kill");
        }
    }

    fn hangup_group(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            if let Err(e) = self.signal_raw(pid, libc::SIGHUP) {
                debug!(pid, error = %e, "Hangup failed");
            }
            return;
        }

        if let Err(e) = self.signal(SignalKind::Hangup) {
            debug!(pid = ?self.pid, error = %e, "Hangup failed");
        }
    }

    /// Wait until no member of the child's process group is left.
    ///
    /// Returns `false` if some are still running at `deadline`.
    async fn wait_for_group(&self, deadline: tokio::time::Instant) -> bool {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            while group_alive(pid) {
                if tokio::time::Instant::now() >= deadline {
                    return false;
                }
                tokio::time::sleep(GROUP_POLL_INTERVAL).await;
            }
        }
        true
    }

    /// Kill the child's process group without waiting.
    fn force_kill(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            if let Err(e) = self.signal_raw(pid, libc::SIGKILL) {
                warn!(pid, error = %e, "Failed to kill process group");
            }
            return;
        }

        if self.has_exited() {
            return;
        }
        if let Ok(mut killer) = self.killer.lock() {
            if let Err(e) = killer.kill() {
                warn!(pid = ?self.pid, error = %e, "Failed to kill process");
            }
        }
    }

    /// Signal the group, or the leader alone while it has not been reaped.
    ///
    /// Once the leader is reaped its pid may be reused, so only the group
    /// is addressed; the group id stays reserved while any member is alive.
    /// Between the reap and the waiter publishing it a signal can still
    /// reach a reused pid; the window is a few instructions wide.
    /// A group with no members left is not an error.
    #[cfg(unix)]
    fn signal_raw(&self, pid: u32, sig: libc::c_int) -> std::io::Result<()> {
        let result = if self.has_exited() {
            signal_group_only(pid, sig)
        } else {
            signal_group(pid, sig)
        };
        match result {
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Ok(()),
            other => other,
        }
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        // Also reaches descendants of a leader that already exited.
        self.force_kill();
    }
}

#[cfg(unix)]
fn group_id(pid: u32) -> std::io::Result<libc::pid_t> {
    match libc::pid_t::try_from(pid) {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid pid {pid}"),
        )),
    }
}

/// Send `sig` to every member of the process group led by `pid`.
#[cfg(unix)]
fn signal_group_only(pid: u32, sig: libc::c_int) -> std::io::Result<()> {
    let pgid = group_id(pid)?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(-pgid, sig) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Send `sig` to the process group led by `pid`, falling back to the process.
///
/// portable-pty makes the child a session leader, so its pid is also its
/// process group id and shell jobs receive the signal too.
#[cfg(unix)]
fn signal_group(pid: u32, sig: libc::c_int) -> std::io::Result<()> {
    match signal_group_only(pid, sig) {
        Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {
            let pid = group_id(pid)?;
            // SAFETY: as above.
            if unsafe { libc::kill(pid, sig) } == 0 {
                Ok(())
            } else {
                Err(std::io::Error::last_os_error())
            }
        }
        other => other,
    }
}

/// Whether any process is left in the group led by `pid`.
#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    match signal_group_only(pid, 0) {
        Ok(()) => true,
        Err(e) => e.raw_os_error() == Some(libc::EPERM),
    }
}
