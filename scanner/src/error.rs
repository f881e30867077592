use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("directory walk: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("scan cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ScanResult<T> = Result<T, ScanError>;
