//! The workload collaborator: who the monitor is running next to, and how
//! to force a restart of that workload when integrity is violated.

mod incluster;

pub use incluster::{ApiConfig, InClusterApi, SERVICE_ACCOUNT_DIR, derive_workload_name};

use async_trait::async_trait;

/// Identity of the monitored workload as reported by the cluster. The
/// engine only interprets `namespace` and `image` (snapshot keying); the
/// rest is alert metadata and restart addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadIdentity {
    pub namespace: String,
    pub pod_name: String,
    pub workload_name: String,
    pub workload_kind: String,
    pub image: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("workload configuration: {0}")]
    Config(String),

    #[error("kubernetes api: {0}")]
    Api(String),

    #[error("unexpected api status {status}: {body}")]
    Status { status: u16, body: String },
}

pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Injected control-plane collaborator. The monitor never talks to the
/// cluster directly; it asks this trait for its identity and for a restart
/// of the owning workload.
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    fn identity(&self) -> &WorkloadIdentity;

    async fn restart(&self) -> WorkloadResult<()>;
}
