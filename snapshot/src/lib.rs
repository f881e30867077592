//! Reference-snapshot model: the `<hex-hash>  <path>` text codec, object
//! naming, and the blob-store adapters the integrity engine reads from and
//! the producers write to.

mod codec;
mod error;
mod key;
mod memory;
mod minio;
mod sign;
mod store;

pub use codec::{Snapshot, SnapshotEntry, relative_path};
pub use error::{SnapshotError, SnapshotResult};
pub use key::{DEFAULT_BUCKET, SnapshotKey};
pub use memory::MemoryStore;
pub use minio::{MinioConfig, MinioStore};
pub use store::{SnapshotStore, StoreError, StoreResult};
