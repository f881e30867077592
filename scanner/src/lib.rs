//! Concurrent file-hashing pipeline: a digest registry, a streaming file
//! hasher, a directory walker, and a bounded worker pool that turns a set
//! of roots into a stream of [`FileHash`] results.

mod error;
mod hash;
mod pool;
mod registry;
mod walk;

pub use error::{ScanError, ScanResult};
pub use hash::hash_file;
pub use pool::{HashStream, Scanner};
pub use registry::{Algorithm, DigestFactory, DigestRegistry};

use std::path::PathBuf;

/// A single hashed file: the absolute path as observed during the scan and
/// the lowercase hex digest of its full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    pub path: PathBuf,
    pub hash: String,
}
