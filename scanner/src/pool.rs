use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ScanError, ScanResult};
use crate::registry::Algorithm;
use crate::walk::walk_roots;
use crate::{FileHash, hash_file};

/// Paths queued between the walker and the workers.
const WALK_QUEUE: usize = 256;

/// Walks a set of roots and hashes every regular file with a bounded pool
/// of workers. One `scan` call is one pass; the scanner itself is cheap to
/// clone per pass.
#[derive(Debug, Clone)]
pub struct Scanner {
    algorithm: Algorithm,
    workers: usize,
}

impl Scanner {
    pub fn new(algorithm: Algorithm, workers: usize) -> Self {
        Self {
            algorithm,
            workers: workers.max(1),
        }
    }

    /// Default pool size: the number of available CPU cores.
    pub fn default_workers() -> usize {
        std::thread::available_parallelism().map_or(1, usize::from)
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    /// Start one scan pass over `roots`.
    ///
    /// Every input path that hashes cleanly appears exactly once in the
    /// output; per-file read errors are logged and skipped. The output
    /// channel is bounded by the worker count, so producers block on
    /// backpressure. Cancelling `token` stops new work, lets files in
    /// flight finish, and surfaces `ScanError::Cancelled` from
    /// [`HashStream::finish`].
    pub fn scan(&self, roots: &[PathBuf], token: &CancellationToken) -> HashStream {
        let (path_tx, path_rx) = mpsc::channel::<PathBuf>(WALK_QUEUE);
        let (hash_tx, hash_rx) = mpsc::channel::<FileHash>(self.workers);
        let mut tasks: JoinSet<ScanResult<()>> = JoinSet::new();

        {
            let roots = roots.to_vec();
            let token = token.clone();
            tasks.spawn(async move {
                let walked = tokio::task::spawn_blocking(move || {
                    walk_roots(&roots, &path_tx, &token)
                })
                .await;
                match walked {
                    Ok(res) => res,
                    Err(e) => Err(ScanError::Internal(format!("walker task: {e}"))),
                }
            });
        }

        // Workers pull from a shared receiver; each owns a private digest.
        let path_rx = Arc::new(Mutex::new(path_rx));
        for _ in 0..self.workers {
            let path_rx = Arc::clone(&path_rx);
            let hash_tx = hash_tx.clone();
            let token = token.clone();
            let mut digest = self.algorithm.digest();
            tasks.spawn(async move {
                loop {
                    let path = {
                        let mut rx = path_rx.lock().await;
                        tokio::select! {
                            () = token.cancelled() => return Ok(()),
                            path = rx.recv() => path,
                        }
                    };
                    let Some(path) = path else {
                        return Ok(());
                    };
                    match hash_file(&path, digest.as_mut()).await {
                        Ok(hash) => {
                            tokio::select! {
                                () = token.cancelled() => return Ok(()),
                                sent = hash_tx.send(FileHash { path, hash }) => {
                                    if sent.is_err() {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                        Err(err) => {
                            // Transient per-file failure: skip it, the pass
                            // continues with the remaining files.
                            warn!(error = %err, "hashing failed, file skipped");
                        }
                    }
                }
            });
        }
        drop(hash_tx);

        let handle = tokio::spawn(async move {
            let mut first_err: Option<ScanError> = None;
            while let Some(joined) = tasks.join_next().await {
                let err = match joined {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => e,
                    Err(e) => ScanError::Internal(format!("scan task panicked: {e}")),
                };
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
            match first_err {
                Some(err) => Err(err),
                None => Ok(()),
            }
        });

        HashStream {
            rx: hash_rx,
            handle,
        }
    }
}

/// The output side of one scan pass.
#[derive(Debug)]
pub struct HashStream {
    rx: mpsc::Receiver<FileHash>,
    handle: tokio::task::JoinHandle<ScanResult<()>>,
}

impl HashStream {
    /// Next hashed file; `None` once the walk is exhausted and all workers
    /// have drained.
    pub async fn recv(&mut self) -> Option<FileHash> {
        self.rx.recv().await
    }

    /// Tear down the pass and surface its verdict. Dropping the receiver
    /// first unblocks any producer still waiting on backpressure.
    pub async fn finish(self) -> ScanResult<()> {
        drop(self.rx);
        self.handle
            .await
            .map_err(|e| ScanError::Internal(format!("scan join: {e}")))?
    }

    /// Drain the remaining results into a vector and finish the pass.
    pub async fn collect(mut self) -> ScanResult<Vec<FileHash>> {
        let mut hashes = Vec::new();
        while let Some(fh) = self.rx.recv().await {
            hashes.push(fh);
        }
        self.finish().await.map(|()| hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DigestRegistry;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn scanner(workers: usize) -> Scanner {
        Scanner::new(DigestRegistry::with_defaults().resolve("sha256"), workers)
    }

    #[tokio::test]
    async fn hashes_every_regular_file_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        for i in 0..20 {
            std::fs::write(dir.path().join(format!("f{i}")), format!("{i}")).unwrap();
        }
        std::fs::write(dir.path().join("sub/nested"), b"n").unwrap();
        std::os::unix::fs::symlink(dir.path().join("f0"), dir.path().join("alias")).unwrap();

        for workers in [1, 4] {
            let token = CancellationToken::new();
            let stream = scanner(workers).scan(&[dir.path().to_path_buf()], &token);
            let hashes = stream.collect().await.unwrap();
            assert_eq!(hashes.len(), 21, "workers={workers}");

            let by_path: BTreeMap<_, _> =
                hashes.iter().map(|fh| (fh.path.clone(), fh.hash.clone())).collect();
            assert_eq!(by_path.len(), 21, "duplicate paths with workers={workers}");
            assert!(!by_path.contains_key(&dir.path().join("alias")));
        }
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let hashes = scanner(4)
            .scan(&[dir.path().to_path_buf()], &token)
            .collect()
            .await
            .unwrap();
        assert!(hashes.is_empty());
    }

    #[tokio::test]
    async fn hashes_match_direct_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello"), b"hi\n").unwrap();

        let token = CancellationToken::new();
        let hashes = scanner(2)
            .scan(&[dir.path().to_path_buf()], &token)
            .collect()
            .await
            .unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(
            hashes[0].hash,
            "98ea6e4f216f2fb4b69fff9b3a44842c38686ca685f3f55dc48c5d3fb1107be4"
        );
    }

    #[tokio::test]
    async fn pre_cancelled_token_fails_without_results() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"1").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let mut stream = scanner(2).scan(&[dir.path().to_path_buf()], &token);
        assert!(stream.recv().await.is_none());
        let err = stream.finish().await.unwrap_err();
        assert!(matches!(err, ScanError::Cancelled), "got: {err}");
    }

    #[tokio::test]
    async fn cancellation_mid_scan_is_prompt() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..2000 {
            std::fs::write(dir.path().join(format!("f{i}")), b"x").unwrap();
        }

        let token = CancellationToken::new();
        let mut stream = scanner(2).scan(&[dir.path().to_path_buf()], &token);
        // Take one result, then cancel while the walker is still busy.
        let first = stream.recv().await;
        assert!(first.is_some());
        token.cancel();

        let verdict = tokio::time::timeout(Duration::from_millis(500), stream.finish())
            .await
            .unwrap();
        assert!(
            matches!(verdict, Err(ScanError::Cancelled)),
            "got: {verdict:?}"
        );
    }

    #[tokio::test]
    async fn missing_root_surfaces_error_from_finish() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let err = scanner(2)
            .scan(&[dir.path().join("absent")], &token)
            .collect()
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Walk(_)), "got: {err}");
    }
}
