use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{object}")]
    NotFound { bucket: String, object: String },

    #[error("store request failed: {0}")]
    Request(String),

    #[error("unexpected store response {status}: {body}")]
    Status { status: u16, body: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key/value blob store holding reference snapshots.
///
/// `put` is idempotent with last-writer-wins semantics. There is no caching
/// layer on top: every check pass fetches the reference afresh so an
/// operator-driven snapshot update takes effect on the next tick.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, bucket: &str, object: &str, data: Vec<u8>) -> StoreResult<()>;

    /// Returns [`StoreError::NotFound`] when the object is absent.
    async fn get(&self, bucket: &str, object: &str) -> StoreResult<Vec<u8>>;

    async fn remove(&self, bucket: &str, object: &str) -> StoreResult<()>;

    async fn ensure_bucket(&self, bucket: &str) -> StoreResult<()>;

    async fn list_buckets(&self) -> StoreResult<Vec<String>>;
}
