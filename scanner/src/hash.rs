use std::path::Path;

use digest::DynDigest;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{ScanError, ScanResult};

const BLOCK_SIZE: usize = 64 * 1024;

/// Stream a file through `digest` in block-sized reads and return the
/// lowercase hex digest. The digest is reset afterwards and can be reused
/// for the next file.
pub async fn hash_file(path: &Path, digest: &mut (dyn DynDigest + Send)) -> ScanResult<String> {
    let mut file = File::open(path).await.map_err(|source| ScanError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf).await.map_err(|source| ScanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        let (chunk, _) = buf.split_at(n);
        digest.update(chunk);
    }

    Ok(hex::encode(digest.finalize_reset()))
}
