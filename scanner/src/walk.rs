use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::error::{ScanError, ScanResult};

/// Walk `roots` in order and push every regular file into `tx`.
///
/// Runs on a blocking thread. Symlinks are never followed and never
/// emitted. The first traversal error ends the walk with that error;
/// paths already emitted stay with the consumer. Each entry checks the
/// cancellation token so a cancelled scan stops within one file.
pub(crate) fn walk_roots(
    roots: &[PathBuf],
    tx: &mpsc::Sender<PathBuf>,
    token: &CancellationToken,
) -> ScanResult<()> {
    for root in roots {
        for entry in WalkDir::new(root).follow_links(false) {
            if token.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if tx.blocking_send(entry.into_path()).is_err() {
                // Receivers are gone: either the scan was cancelled or the
                // consumer already decided the pass.
                if token.is_cancelled() {
                    return Err(ScanError::Cancelled);
                }
                return Ok(());
            }
        }
    }
    Ok(())
}
