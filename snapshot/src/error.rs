use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("empty hash record")]
    EmptyRecord,

    #[error("malformed hash record: {record:?}")]
    MalformedRecord { record: String },

    #[error("path {path} is not beneath the monitored root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path {path} is not valid UTF-8")]
    InvalidPath { path: PathBuf },
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
