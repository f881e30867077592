use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use alerts::{Alert, Fanout};
use scanner::{ScanError, Scanner};
use snapshot::{Snapshot, SnapshotKey, SnapshotStore, StoreError, relative_path};
use workload::WorkloadApi;

use crate::error::{MonitorError, MonitorResult};
use crate::integrity::{IntegrityError, IntegrityKind};
use crate::procroot::ProcessRoots;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between monitoring passes.
    pub interval: Duration,
    /// Bucket holding reference snapshots.
    pub bucket: String,
    /// Bound on each store write during setup.
    pub put_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            bucket: snapshot::DEFAULT_BUCKET.to_string(),
            put_timeout: Duration::from_secs(3),
        }
    }
}

/// One monitored process: where to hash, and which image keys its
/// reference snapshot.
#[derive(Debug, Clone)]
pub struct Target {
    pub process_name: String,
    pub relative_paths: Vec<String>,
    pub image: String,
}

/// Result of one check pass over a single target.
#[derive(Debug)]
pub enum PassOutcome {
    /// Every observed file matched the reference.
    Clean { files: usize },
    /// The pass diverged; the alert fan-out and restart already ran.
    Violation(IntegrityError),
    /// No reference snapshot in the store. Not tampering: the target is
    /// simply not configured yet, so the pass is skipped without alerts.
    MissingReference,
}

/// The integrity engine: owns the periodic loop and drives
/// hash → compare → classify → alert → remediate for every target.
pub struct Engine {
    config: EngineConfig,
    scanner: Scanner,
    store: Arc<dyn SnapshotStore>,
    fanout: Arc<Fanout>,
    workload: Arc<dyn WorkloadApi>,
    roots: ProcessRoots,
    targets: Vec<Target>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        scanner: Scanner,
        store: Arc<dyn SnapshotStore>,
        fanout: Arc<Fanout>,
        workload: Arc<dyn WorkloadApi>,
        roots: ProcessRoots,
        targets: Vec<Target>,
    ) -> Self {
        Self {
            config,
            scanner,
            store,
            fanout,
            workload,
            roots,
            targets,
        }
    }

    /// Run setup for every target, then tick until the token fires.
    /// Cancellation is a clean shutdown; setup failures are fatal.
    pub async fn run(&self, token: CancellationToken) -> MonitorResult<()> {
        self.store.ensure_bucket(&self.config.bucket).await?;
        for target in &self.targets {
            self.setup_target(target, &token).await?;
        }

        let mut ticker = tokio::time::interval(self.config.interval);
        // A pass that overruns the interval delays the next tick instead of
        // stacking a burst of passes behind it.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    info!("shutdown requested, monitor stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            for target in &self.targets {
                match self.check_target(target, &token).await {
                    Ok(PassOutcome::Clean { files }) => {
                        info!(process = %target.process_name, files, "integrity check passed");
                    }
                    Ok(PassOutcome::Violation(violation)) => {
                        warn!(
                            process = %target.process_name,
                            path = %violation.path,
                            reason = violation.kind.reason(),
                            "integrity violation, restart issued"
                        );
                    }
                    Ok(PassOutcome::MissingReference) => {}
                    Err(MonitorError::Cancelled) => {
                        info!("shutdown requested, monitor stopping");
                        return Ok(());
                    }
                    // Infrastructure trouble is logged and retried on the
                    // next tick; only cancellation stops the engine.
                    Err(err) => {
                        error!(process = %target.process_name, error = %err, "integrity pass failed");
                    }
                }
            }
        }
    }

    fn key_for(&self, target: &Target) -> SnapshotKey {
        SnapshotKey::from_image(
            &self.workload.identity().namespace,
            &target.image,
            self.scanner.algorithm().name(),
        )
    }

    /// Compute and store the reference snapshot for `target`, unless one is
    /// already present: snapshots written by the producer CLI or the sync
    /// controller are authoritative and must not be overwritten.
    pub async fn setup_target(
        &self,
        target: &Target,
        token: &CancellationToken,
    ) -> MonitorResult<()> {
        let object = self.key_for(target).object_name();
        match self.store.get(&self.config.bucket, &object).await {
            Ok(_) => {
                debug!(%object, "reference snapshot already present");
                return Ok(());
            }
            Err(StoreError::NotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }

        let process_root = self.roots.resolve(&target.process_name).await?;
        let scan_roots = ProcessRoots::scan_roots(&process_root, &target.relative_paths);
        let hashes = self
            .scanner
            .scan(&scan_roots, token)
            .collect()
            .await
            .map_err(map_scan_error)?;

        let reference = Snapshot::from_scan(hashes, &process_root)?;
        let data = reference.serialize().into_bytes();
        let put = self.store.put(&self.config.bucket, &object, data);
        tokio::time::timeout(self.config.put_timeout, put)
            .await
            .map_err(|_| MonitorError::StoreTimeout)??;

        info!(
            process = %target.process_name,
            files = reference.len(),
            object,
            "reference snapshot stored"
        );
        Ok(())
    }

    /// One check pass: fetch the reference afresh, rehash the monitored
    /// roots, and compare as sets. The first divergence decides the pass
    /// and cancels the remaining hash work; at most one violation (and one
    /// restart) comes out of a single pass.
    pub async fn check_target(
        &self,
        target: &Target,
        token: &CancellationToken,
    ) -> MonitorResult<PassOutcome> {
        let object = self.key_for(target).object_name();
        let raw = match self.store.get(&self.config.bucket, &object).await {
            Ok(data) => data,
            Err(StoreError::NotFound { .. }) => {
                warn!(%object, "reference snapshot missing, pass skipped");
                return Ok(PassOutcome::MissingReference);
            }
            Err(err) => return Err(err.into()),
        };
        let text = String::from_utf8(raw)
            .map_err(|e| MonitorError::CorruptReference(e.to_string()))?;
        let reference =
            Snapshot::parse(&text).map_err(|e| MonitorError::CorruptReference(e.to_string()))?;

        let mut expected = reference.to_map();
        let process_root = self.roots.resolve(&target.process_name).await?;
        let scan_roots = ProcessRoots::scan_roots(&process_root, &target.relative_paths);

        let pass_token = token.child_token();
        let mut stream = self.scanner.scan(&scan_roots, &pass_token);
        let mut observed = 0usize;
        let mut violation: Option<IntegrityError> = None;

        while let Some(fh) = stream.recv().await {
            let rel = relative_path(&fh.path, &process_root)?;
            observed += 1;
            match expected.remove(&rel) {
                Some(ref hash) if *hash == fh.hash => {}
                Some(_) => {
                    violation = Some(IntegrityError {
                        kind: IntegrityKind::FileMismatch,
                        path: rel,
                        hash: fh.hash,
                    });
                    pass_token.cancel();
                    break;
                }
                None => {
                    violation = Some(IntegrityError {
                        kind: IntegrityKind::NewFile,
                        path: rel,
                        hash: fh.hash,
                    });
                    pass_token.cancel();
                    break;
                }
            }
        }

        let scan_verdict = stream.finish().await;
        if violation.is_none() {
            match scan_verdict {
                Ok(()) => {}
                Err(ScanError::Cancelled) if token.is_cancelled() => {
                    return Err(MonitorError::Cancelled);
                }
                Err(err) => return Err(err.into()),
            }
            // Everything observed matched; whatever the reference still
            // expects has been deleted. Surface the first entry only.
            if let Some((path, hash)) = expected.pop_first() {
                violation = Some(IntegrityError {
                    kind: IntegrityKind::FileDeleted,
                    path,
                    hash,
                });
            }
        }

        match violation {
            Some(violation) => {
                self.remediate(target, &violation).await;
                Ok(PassOutcome::Violation(violation))
            }
            None => Ok(PassOutcome::Clean { files: observed }),
        }
    }

    /// Alert fan-out, then restart. Both are best-effort: a sink or API
    /// failure is logged and the engine stays scheduled.
    async fn remediate(&self, target: &Target, violation: &IntegrityError) {
        let identity = self.workload.identity();
        let alert = Alert::new(
            format!("restarting workload {}", identity.workload_name),
            violation.kind.reason(),
            violation.path.clone(),
            target.process_name.clone(),
        );
        if let Err(err) = self.fanout.send(&alert).await {
            error!(error = %err, "alert delivery incomplete");
        }
        if let Err(err) = self.workload.restart().await {
            error!(error = %err, "workload restart failed");
        }
    }
}

fn map_scan_error(err: ScanError) -> MonitorError {
    match err {
        ScanError::Cancelled => MonitorError::Cancelled,
        other => MonitorError::Scan(other),
    }
}
