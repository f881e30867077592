//! End-to-end engine scenarios: setup, clean checks, the three violation
//! kinds, remediation fan-out, and cancellation.

// The clippy.toml in-tests overrides only reach `#[cfg(test)]` code; the
// shared harness helpers here live in a plain integration-test crate.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use alerts::{Alert, Fanout, Sink, SinkError};
use monitor::engine::{Engine, EngineConfig, PassOutcome, Target};
use monitor::error::MonitorError;
use monitor::integrity::IntegrityKind;
use monitor::procroot::ProcessRoots;
use scanner::{DigestRegistry, Scanner};
use snapshot::{MemoryStore, SnapshotStore};
use workload::{WorkloadApi, WorkloadIdentity, WorkloadResult};

const SHA_HI: &str = "98ea6e4f216f2fb4b69fff9b3a44842c38686ca685f3f55dc48c5d3fb1107be4";
const OBJECT: &str = "default/nginx/1.25.sha256";

struct RecordingSink(Arc<Mutex<Vec<Alert>>>);

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

struct MockWorkload {
    identity: WorkloadIdentity,
    restarts: AtomicUsize,
}

impl MockWorkload {
    fn new() -> Self {
        Self {
            identity: WorkloadIdentity {
                namespace: "default".into(),
                pod_name: "myapp-7d9c5b4f6-x2x9z".into(),
                workload_name: "myapp".into(),
                workload_kind: "Deployment".into(),
                image: "nginx:1.25".into(),
            },
            restarts: AtomicUsize::new(0),
        }
    }

    fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkloadApi for MockWorkload {
    fn identity(&self) -> &WorkloadIdentity {
        &self.identity
    }

    async fn restart(&self) -> WorkloadResult<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    dir: tempfile::TempDir,
    engine: Engine,
    target: Target,
    alerts: Arc<Mutex<Vec<Alert>>>,
    workload: Arc<MockWorkload>,
    store: Arc<MemoryStore>,
}

impl Harness {
    /// Monitored filesystem as seen through the fake procfs.
    fn root(&self) -> PathBuf {
        self.dir.path().join("proc/42/root")
    }

    fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

/// Fake procfs with one `nginx` process (pid 42) whose root holds
/// `etc/hello` with content `hi\n`.
async fn harness() -> Harness {
    harness_with_workers(2).await
}

async fn harness_with_workers(workers: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let proc_dir = dir.path().join("proc");
    let root = proc_dir.join("42/root");
    tokio::fs::create_dir_all(root.join("etc")).await.unwrap();
    tokio::fs::write(proc_dir.join("42/comm"), "nginx\n").await.unwrap();
    tokio::fs::write(root.join("etc/hello"), "hi\n").await.unwrap();

    let alerts = Arc::new(Mutex::new(Vec::new()));
    let mut fanout = Fanout::new();
    fanout.register(Box::new(RecordingSink(Arc::clone(&alerts))));

    let workload = Arc::new(MockWorkload::new());
    let store = Arc::new(MemoryStore::new());
    let target = Target {
        process_name: "nginx".into(),
        relative_paths: vec!["/etc".into()],
        image: "nginx:1.25".into(),
    };

    let engine = Engine::new(
        EngineConfig {
            interval: Duration::from_millis(50),
            bucket: "integrity".into(),
            put_timeout: Duration::from_secs(3),
        },
        Scanner::new(DigestRegistry::with_defaults().resolve("sha256"), workers),
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
        Arc::new(fanout),
        Arc::clone(&workload) as Arc<dyn WorkloadApi>,
        ProcessRoots::with_base(proc_dir),
        vec![target.clone()],
    );

    Harness {
        dir,
        engine,
        target,
        alerts,
        workload,
        store,
    }
}

#[tokio::test]
async fn setup_then_clean_check() {
    let h = harness().await;
    let token = CancellationToken::new();

    h.engine.setup_target(&h.target, &token).await.unwrap();

    let stored = h.store.get("integrity", OBJECT).await.unwrap();
    assert_eq!(String::from_utf8(stored).unwrap(), format!("{SHA_HI}  etc/hello\n"));

    let outcome = h.engine.check_target(&h.target, &token).await.unwrap();
    assert!(matches!(outcome, PassOutcome::Clean { files: 1 }), "got: {outcome:?}");
    assert!(h.alerts().is_empty());
    assert_eq!(h.workload.restarts(), 0);
}

#[tokio::test]
async fn modified_file_raises_one_mismatch_and_one_restart() {
    let h = harness().await;
    let token = CancellationToken::new();
    h.engine.setup_target(&h.target, &token).await.unwrap();

    tokio::fs::write(h.root().join("etc/hello"), "ho\n").await.unwrap();

    let outcome = h.engine.check_target(&h.target, &token).await.unwrap();
    match outcome {
        PassOutcome::Violation(v) => {
            assert_eq!(v.kind, IntegrityKind::FileMismatch);
            assert_eq!(v.path, "etc/hello");
        }
        other => panic!("expected violation, got {other:?}"),
    }

    let alerts = h.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].reason, "file content mismatch");
    assert_eq!(alerts[0].path, "etc/hello");
    assert_eq!(alerts[0].message, "restarting workload myapp");
    assert_eq!(alerts[0].process_name, "nginx");
    assert_eq!(h.workload.restarts(), 1);
}

#[tokio::test]
async fn extra_file_raises_new_file() {
    let h = harness().await;
    let token = CancellationToken::new();
    h.engine.setup_target(&h.target, &token).await.unwrap();

    tokio::fs::write(h.root().join("etc/extra"), "anything").await.unwrap();

    let outcome = h.engine.check_target(&h.target, &token).await.unwrap();
    match outcome {
        PassOutcome::Violation(v) => {
            assert_eq!(v.kind, IntegrityKind::NewFile);
            assert_eq!(v.path, "etc/extra");
        }
        other => panic!("expected violation, got {other:?}"),
    }
    let alerts = h.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].reason, "new file found");
    assert_eq!(h.workload.restarts(), 1);
}

#[tokio::test]
async fn deleted_file_raises_file_deleted() {
    let h = harness().await;
    let token = CancellationToken::new();
    h.engine.setup_target(&h.target, &token).await.unwrap();

    tokio::fs::remove_file(h.root().join("etc/hello")).await.unwrap();

    let outcome = h.engine.check_target(&h.target, &token).await.unwrap();
    match outcome {
        PassOutcome::Violation(v) => {
            assert_eq!(v.kind, IntegrityKind::FileDeleted);
            assert_eq!(v.path, "etc/hello");
            assert_eq!(v.hash, SHA_HI);
        }
        other => panic!("expected violation, got {other:?}"),
    }
    let alerts = h.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].reason, "file deleted");
    assert_eq!(h.workload.restarts(), 1);
}

#[tokio::test]
async fn symlinks_are_never_reported_as_new_files() {
    let h = harness().await;
    let token = CancellationToken::new();
    h.engine.setup_target(&h.target, &token).await.unwrap();

    std::os::unix::fs::symlink(h.root().join("etc/hello"), h.root().join("etc/alias")).unwrap();

    let outcome = h.engine.check_target(&h.target, &token).await.unwrap();
    assert!(matches!(outcome, PassOutcome::Clean { files: 1 }), "got: {outcome:?}");
    assert!(h.alerts().is_empty());
}

#[tokio::test]
async fn missing_reference_skips_the_pass_without_alerts() {
    let h = harness().await;
    let token = CancellationToken::new();

    let outcome = h.engine.check_target(&h.target, &token).await.unwrap();
    assert!(matches!(outcome, PassOutcome::MissingReference), "got: {outcome:?}");
    assert!(h.alerts().is_empty());
    assert_eq!(h.workload.restarts(), 0);
}

#[tokio::test]
async fn corrupt_reference_aborts_the_pass_without_alerts() {
    let h = harness().await;
    let token = CancellationToken::new();
    h.store
        .put("integrity", OBJECT, b"not a snapshot record".to_vec())
        .await
        .unwrap();

    let err = h.engine.check_target(&h.target, &token).await.unwrap_err();
    assert!(matches!(err, MonitorError::CorruptReference(_)), "got: {err}");
    assert!(h.alerts().is_empty());
    assert_eq!(h.workload.restarts(), 0);
}

#[tokio::test]
async fn setup_never_overwrites_an_existing_reference() {
    let h = harness().await;
    let token = CancellationToken::new();
    let producer_blob = format!("{SHA_HI}  etc/hello\n");
    h.store
        .put("integrity", OBJECT, producer_blob.clone().into_bytes())
        .await
        .unwrap();

    h.engine.setup_target(&h.target, &token).await.unwrap();

    let stored = h.store.get("integrity", OBJECT).await.unwrap();
    assert_eq!(stored, producer_blob.as_bytes());
}

#[tokio::test]
async fn empty_monitored_directory_is_a_clean_check() {
    let h = harness().await;
    let token = CancellationToken::new();
    tokio::fs::remove_file(h.root().join("etc/hello")).await.unwrap();

    h.engine.setup_target(&h.target, &token).await.unwrap();
    let stored = h.store.get("integrity", OBJECT).await.unwrap();
    assert!(stored.is_empty());

    let outcome = h.engine.check_target(&h.target, &token).await.unwrap();
    assert!(matches!(outcome, PassOutcome::Clean { files: 0 }), "got: {outcome:?}");
}

#[tokio::test]
async fn pid_change_between_passes_is_picked_up() {
    let h = harness().await;
    let token = CancellationToken::new();
    h.engine.setup_target(&h.target, &token).await.unwrap();

    // The container restarted: same process name, new PID, same content.
    let proc_dir = h.dir.path().join("proc");
    tokio::fs::remove_dir_all(proc_dir.join("42")).await.unwrap();
    let new_root = proc_dir.join("77/root");
    tokio::fs::create_dir_all(new_root.join("etc")).await.unwrap();
    tokio::fs::write(proc_dir.join("77/comm"), "nginx\n").await.unwrap();
    tokio::fs::write(new_root.join("etc/hello"), "hi\n").await.unwrap();

    let outcome = h.engine.check_target(&h.target, &token).await.unwrap();
    assert!(matches!(outcome, PassOutcome::Clean { files: 1 }), "got: {outcome:?}");
}

#[tokio::test]
async fn vanished_process_fails_the_pass_only() {
    let h = harness().await;
    let token = CancellationToken::new();
    h.engine.setup_target(&h.target, &token).await.unwrap();

    tokio::fs::remove_dir_all(h.dir.path().join("proc/42")).await.unwrap();

    let err = h.engine.check_target(&h.target, &token).await.unwrap_err();
    assert!(
        matches!(err, MonitorError::ProcessNotFound { ref name } if name == "nginx"),
        "got: {err}"
    );
    assert!(h.alerts().is_empty());
    assert_eq!(h.workload.restarts(), 0);
}

#[tokio::test]
async fn pre_cancelled_token_yields_a_cancellation_error() {
    let h = harness().await;
    let token = CancellationToken::new();
    h.engine.setup_target(&h.target, &token).await.unwrap();

    token.cancel();
    let err = h.engine.check_target(&h.target, &token).await.unwrap_err();
    assert!(matches!(err, MonitorError::Cancelled), "got: {err}");
    assert!(h.alerts().is_empty());
}

#[tokio::test]
async fn cancellation_mid_pass_is_bounded_and_silent() {
    let h = harness_with_workers(1).await;
    let token = CancellationToken::new();

    // A large tree so the pass is still hashing when the token fires.
    let etc = h.root().join("etc");
    for i in 0..5000 {
        std::fs::write(etc.join(format!("f{i}")), vec![0x5au8; 4096]).unwrap();
    }
    h.engine.setup_target(&h.target, &token).await.unwrap();

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = h.engine.check_target(&h.target, &token).await.unwrap_err();
    assert!(matches!(err, MonitorError::Cancelled), "got: {err}");
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "cancellation took {:?}",
        started.elapsed()
    );
    assert!(h.alerts().is_empty());
    assert_eq!(h.workload.restarts(), 0);
}

#[tokio::test]
async fn run_loop_detects_tampering_and_stops_on_cancel() {
    let h = harness().await;
    let token = CancellationToken::new();

    let engine = h.engine;
    let run_token = token.clone();
    let handle = tokio::spawn(async move { engine.run(run_token).await });

    // Let setup and at least one clean tick happen, then tamper.
    tokio::time::sleep(Duration::from_millis(120)).await;
    tokio::fs::write(h.dir.path().join("proc/42/root/etc/hello"), "ho\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    token.cancel();
    handle.await.unwrap().unwrap();

    assert!(h.workload.restarts() >= 1);
    let alerts = h.alerts.lock().unwrap();
    assert!(!alerts.is_empty());
    assert!(alerts.iter().all(|a| a.reason == "file content mismatch"));
}
