//! End-to-end bridge scenarios over in-process byte channels.
//!
//! These exercise the whole path a transport binding uses (authenticate,
//! spawn, pump, control, teardown) without any network in between.

#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shell_bridge::{
    Bridge, BridgeConfig, BridgeError, BridgeState, ControlEvent, Dispatch, NativeSpawner,
    PtyProcess, PtySize, PumpExit, SessionId, SignalKind, Spawn, SpawnSpec,
};
use tokio::sync::mpsc;

#[derive(Default)]
struct CountingSpawner {
    calls: AtomicUsize,
}

impl Spawn for CountingSpawner {
    fn spawn(&self, spec: &SpawnSpec) -> shell_bridge::Result<PtyProcess> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        NativeSpawner::new().spawn(spec)
    }
}

fn bridge(command: &str, spawner: Arc<dyn Spawn>) -> Bridge {
    bridge_with_grace(command, spawner, Duration::from_millis(300))
}

fn bridge_with_grace(command: &str, spawner: Arc<dyn Spawn>, kill_grace: Duration) -> Bridge {
    let config = BridgeConfig {
        secret: Some("tok-A".to_string()),
        spawn: SpawnSpec::command_line(command),
        kill_grace,
    };
    Bridge::new(config, spawner)
}

/// Whether `pid` is alive and not a zombie.
#[cfg(target_os = "linux")]
fn process_running(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .map(|stat| {
            stat.rsplit(')')
                .next()
                .is_some_and(|rest| !rest.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
async fn wait_until_gone(pid: u32) -> bool {
    for _ in 0..60 {
        if !process_running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn drain(mut rx: mpsc::Receiver<Vec<u8>>) -> String {
    let mut out = Vec::new();
    while let Some(chunk) = rx.recv().await {
        out.extend(chunk);
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[tokio::test]
async fn test_wrong_then_right_credential() {
    let spawner = Arc::new(CountingSpawner::default());
    let bridge = bridge("echo hi", spawner.clone());

    let err = bridge.open(Some("tok-B"), None).unwrap_err();
    assert!(matches!(err, BridgeError::Unauthenticated));
    assert!(err.is_setup_failure());
    assert_eq!(spawner.calls.load(Ordering::SeqCst), 0);
    assert_eq!(bridge.registry().count(), 0);

    let connection = bridge.open(Some("tok-A"), None).unwrap();
    let id = connection.id();
    let (_input, inbound) = mpsc::channel(8);
    let (outbound, output) = mpsc::channel(8);
    let collector = tokio::spawn(drain(output));

    let outcome = tokio::time::timeout(Duration::from_secs(10), connection.run(inbound, outbound))
        .await
        .expect("echo should end the session");

    assert_eq!(outcome.id, id);
    assert!(outcome.exit.is_process_side());
    assert!(collector.await.unwrap().contains("hi"));
    assert!(bridge.registry().lookup(&id).is_none());
    assert_eq!(spawner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_admission_alone_allocates_nothing() {
    let spawner = Arc::new(CountingSpawner::default());
    let bridge = bridge("cat", spawner.clone());

    let admission = bridge.authenticate(Some("tok-A")).unwrap();
    drop(admission);

    assert_eq!(spawner.calls.load(Ordering::SeqCst), 0);
    assert_eq!(bridge.registry().count(), 0);
}

#[tokio::test]
async fn test_resize_then_query() {
    let bridge = bridge("cat", Arc::new(NativeSpawner::new()));
    let connection = bridge.open(Some("tok-A"), Some(PtySize::new(24, 80))).unwrap();
    assert_eq!(connection.state(), BridgeState::Active);
    let id = connection.id();

    let (input, inbound) = mpsc::channel(8);
    let (outbound, _output) = mpsc::channel(8);
    let session = Arc::clone(connection.session());
    let run = tokio::spawn(connection.run(inbound, outbound));

    let dispatcher = bridge.dispatcher();
    assert_eq!(
        dispatcher.dispatch(id, ControlEvent::Resize { rows: 40, cols: 120 }),
        Dispatch::Applied
    );
    assert_eq!(session.process().size(), Some(PtySize::new(40, 120)));
    assert_eq!(bridge.sessions()[0].rows, 40);
    assert_eq!(bridge.sessions()[0].cols, 120);

    drop(input);
    let outcome = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.exit, PumpExit::TransportClosed);
    assert_eq!(bridge.registry().count(), 0);
}

#[tokio::test]
async fn test_control_events_after_teardown_are_dropped() {
    let bridge = bridge("cat", Arc::new(NativeSpawner::new()));
    let connection = bridge.open(Some("tok-A"), None).unwrap();
    let id = connection.id();

    let (input, inbound) = mpsc::channel(8);
    let (outbound, _output) = mpsc::channel(8);
    drop(input);
    connection.run(inbound, outbound).await;

    let dispatcher = bridge.dispatcher();
    assert_eq!(
        dispatcher.dispatch(id, ControlEvent::Resize { rows: 40, cols: 120 }),
        Dispatch::Dropped
    );
    assert_eq!(
        dispatcher.dispatch(
            id,
            ControlEvent::Signal {
                signal: SignalKind::Kill
            }
        ),
        Dispatch::Dropped
    );
    assert_eq!(
        dispatcher.dispatch(SessionId::from_raw(u64::MAX), ControlEvent::Resize { rows: 1, cols: 1 }),
        Dispatch::Dropped
    );
}

#[tokio::test]
async fn test_interrupt_reaches_foreground_process() {
    let bridge = bridge("trap 'echo caught; exit 7' INT; echo ready; sleep 30", Arc::new(NativeSpawner::new()));
    let connection = bridge.open(Some("tok-A"), None).unwrap();
    let id = connection.id();

    let (_input, inbound) = mpsc::channel(8);
    let (outbound, mut output) = mpsc::channel(8);
    let run = tokio::spawn(connection.run(inbound, outbound));

    let mut seen = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = output.recv().await {
            seen.push_str(&String::from_utf8_lossy(&chunk));
            if seen.contains("ready") {
                break;
            }
        }
    })
    .await
    .expect("shell should print ready");

    let outcome = bridge.dispatcher().dispatch(
        id,
        ControlEvent::Signal {
            signal: SignalKind::Interrupt,
        },
    );
    assert_eq!(outcome, Dispatch::Applied);

    let rest = tokio::spawn(drain(output));
    let outcome = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.exit.is_process_side());
    assert_eq!(outcome.exit_code, Some(7));
    assert!(rest.await.unwrap().contains("caught"));
}

#[tokio::test]
async fn test_many_sessions_are_independent() {
    let bridge = bridge("cat", Arc::new(NativeSpawner::new()));

    let mut inputs = Vec::new();
    let mut runs = Vec::new();
    let mut ids = Vec::new();
    for _ in 0..4 {
        let connection = bridge.open(Some("tok-A"), None).unwrap();
        ids.push(connection.id());
        let (input, inbound) = mpsc::channel(8);
        let (outbound, output) = mpsc::channel(8);
        tokio::spawn(drain(output));
        inputs.push(input);
        runs.push(tokio::spawn(connection.run(inbound, outbound)));
    }
    assert_eq!(bridge.registry().count(), 4);

    // Ending one session leaves the others alone.
    drop(inputs.remove(0));
    let first = tokio::time::timeout(Duration::from_secs(10), runs.remove(0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, ids[0]);
    assert_eq!(bridge.registry().count(), 3);
    for id in &ids[1..] {
        assert!(bridge.registry().contains(id));
    }

    assert_eq!(bridge.shutdown().await, 3);
    for run in runs {
        let outcome = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.exit.is_process_side());
    }
    assert_eq!(bridge.registry().count(), 0);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_lingering_background_job_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("job.pid");
    let command = format!(
        "(trap '' HUP; exec sleep 60) & echo $! > {}; exit 0",
        pid_file.display()
    );
    let bridge = bridge(&command, Arc::new(NativeSpawner::new()));
    let connection = bridge.open(Some("tok-A"), None).unwrap();

    let (_input, inbound) = mpsc::channel(8);
    let (outbound, output) = mpsc::channel(8);
    tokio::spawn(drain(output));

    let started = std::time::Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(10), connection.run(inbound, outbound))
        .await
        .expect("session should end once the shell exits");
    let elapsed = started.elapsed();

    assert!(outcome.exit.is_process_side());
    assert_eq!(bridge.registry().count(), 0);
    // The job held the terminal open; killing it lets the output loop
    // finish instead of being abandoned at the drain timeout.
    assert!(
        elapsed < shell_bridge::pump::DRAIN_TIMEOUT,
        "output loop was abandoned after {elapsed:?}"
    );

    let job: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(wait_until_gone(job).await, "background job {job} survived the session");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_cancelled_run_during_grace_releases_session() {
    let bridge = bridge_with_grace(
        "trap '' HUP; sleep 30",
        Arc::new(NativeSpawner::new()),
        Duration::from_secs(5),
    );
    let connection = bridge.open(Some("tok-A"), None).unwrap();
    let id = connection.id();
    let pid = connection.session().process().pid().unwrap();

    let (input, inbound) = mpsc::channel(8);
    let (outbound, output) = mpsc::channel(8);
    tokio::spawn(drain(output));
    drop(input);

    // Teardown is stuck in the kill grace when the future is dropped.
    let run = tokio::time::timeout(Duration::from_millis(500), connection.run(inbound, outbound)).await;
    assert!(run.is_err());

    assert!(!bridge.registry().contains(&id));
    assert_eq!(bridge.registry().count(), 0);
    assert!(wait_until_gone(pid).await, "process {pid} survived a cancelled session");
}
