//! Snapshot-sync reconciler: the external producer path that turns a
//! declarative snapshot resource into an object in the reference store.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use tracing::{debug, info};

use snapshot::{Snapshot, SnapshotKey, SnapshotStore, StoreError};

/// Held on every resource until its store object is gone.
pub const FINALIZER: &str = "integrity.snapshot/finalizer";

const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Desired state: which image's snapshot to publish, under which algorithm,
/// with the snapshot text inlined as base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSpec {
    pub image: String,
    pub algorithm: String,
    pub base64_hashes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStatus {
    /// Content hash of the inline hashes at the last successful upload.
    pub control_hash: String,
    pub uploaded: bool,
}

/// A declarative snapshot resource as handed to the reconciler. Mirrors the
/// usual custom-resource shape: spec, status, finalizers, and a deletion
/// timestamp once the resource is being torn down.
#[derive(Debug, Clone)]
pub struct SnapshotResource {
    pub name: String,
    pub namespace: String,
    pub spec: SnapshotSpec,
    pub status: SnapshotStatus,
    pub finalizers: Vec<String>,
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl SnapshotResource {
    fn key(&self) -> SnapshotKey {
        SnapshotKey::from_image(&self.namespace, &self.spec.image, &self.spec.algorithm)
    }

    fn has_finalizer(&self) -> bool {
        self.finalizers.iter().any(|f| f == FINALIZER)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Spec content changed (or was never uploaded) and is now in the store.
    Uploaded,
    /// Store already holds this content.
    UpToDate,
    /// Resource is being deleted; the object is gone and the finalizer
    /// released.
    Deleted,
}

#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("invalid inline hashes: {0}")]
    InvalidHashes(String),

    #[error("upload timed out")]
    Timeout,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reconciles snapshot resources into the blob store.
pub struct Reconciler<S> {
    store: S,
    bucket: String,
    upload_timeout: Duration,
}

impl<S: SnapshotStore> Reconciler<S> {
    pub fn new(store: S, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Drive one resource towards its desired state. The caller persists
    /// the mutated status/finalizers afterwards, whatever the outcome.
    pub async fn reconcile(
        &self,
        resource: &mut SnapshotResource,
    ) -> Result<Outcome, OperatorError> {
        if resource.deletion_timestamp.is_some() {
            return self.delete(resource).await;
        }

        if !resource.has_finalizer() {
            resource.finalizers.push(FINALIZER.to_string());
        }

        let control_hash = content_hash(&resource.spec.base64_hashes);
        if control_hash == resource.status.control_hash && resource.status.uploaded {
            debug!(resource = %resource.name, "snapshot unchanged, nothing to upload");
            return Ok(Outcome::UpToDate);
        }

        match self.upload(resource).await {
            Ok(()) => {
                resource.status.control_hash = control_hash;
                resource.status.uploaded = true;
                Ok(Outcome::Uploaded)
            }
            Err(err) => {
                resource.status.uploaded = false;
                Err(err)
            }
        }
    }

    async fn upload(&self, resource: &SnapshotResource) -> Result<(), OperatorError> {
        let data = BASE64
            .decode(resource.spec.base64_hashes.as_bytes())
            .map_err(|e| OperatorError::InvalidHashes(e.to_string()))?;
        // The store object must be readable by the monitor, so the inline
        // content has to be valid snapshot text.
        let text = String::from_utf8(data)
            .map_err(|e| OperatorError::InvalidHashes(e.to_string()))?;
        Snapshot::parse(&text).map_err(|e| OperatorError::InvalidHashes(e.to_string()))?;

        let object = resource.key().object_name();
        let put = self
            .store
            .put(&self.bucket, &object, text.into_bytes());
        tokio::time::timeout(self.upload_timeout, put)
            .await
            .map_err(|_| OperatorError::Timeout)??;
        info!(resource = %resource.name, %object, "snapshot uploaded");
        Ok(())
    }

    async fn delete(&self, resource: &mut SnapshotResource) -> Result<Outcome, OperatorError> {
        let object = resource.key().object_name();
        match self.store.remove(&self.bucket, &object).await {
            // Already gone counts as removed; the finalizer can drop.
            Ok(()) | Err(StoreError::NotFound { .. }) => {
                resource.finalizers.retain(|f| f != FINALIZER);
                info!(resource = %resource.name, %object, "snapshot removed");
                Ok(Outcome::Deleted)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn content_hash(base64_hashes: &str) -> String {
    hex::encode(Md5::digest(base64_hashes.as_bytes()))
}
