use scanner::ScanError;
use snapshot::{SnapshotError, StoreError};
use workload::WorkloadError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("process {name} not found")]
    ProcessNotFound { name: String },

    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("corrupt reference snapshot: {0}")]
    CorruptReference(String),

    #[error("snapshot store: {0}")]
    Store(#[from] StoreError),

    #[error("snapshot store write timed out")]
    StoreTimeout,

    #[error("workload api: {0}")]
    Workload(#[from] WorkloadError),

    #[error("monitor cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
