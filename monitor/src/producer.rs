use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use scanner::{DigestRegistry, Scanner};
use snapshot::Snapshot;

use crate::config::parse_duration;
use crate::error::{MonitorError, MonitorResult};

/// Build a reference snapshot from an extracted image filesystem, for the
/// deploy-time producer path. Export an image with
/// `docker create` + `docker export | tar -x` and point `--root-fs` at it.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Path to the extracted image root filesystem
    #[arg(long = "root-fs", default_value = "./")]
    pub root_fs: PathBuf,

    /// Directories beneath the root to hash, e.g. --dir /app,/bin
    #[arg(long = "dir", value_delimiter = ',', required = true)]
    pub dirs: Vec<String>,

    /// Output file for the snapshot text
    #[arg(long, default_value = "out.txt")]
    pub out: PathBuf,

    /// Hash algorithm
    #[arg(long, default_value = "SHA256", env = "ALGORITHM")]
    pub algorithm: String,

    /// Bound on scanning a single directory
    #[arg(long = "scan-dir-timeout", default_value = "30s", value_parser = parse_duration)]
    pub scan_dir_timeout: Duration,

    /// Size of the hash worker pool (defaults to the CPU count)
    #[arg(long, env = "COUNT_WORKERS")]
    pub count_workers: Option<usize>,
}

pub async fn run_snapshot(args: SnapshotArgs) -> MonitorResult<()> {
    let algorithm = DigestRegistry::with_defaults().resolve(&args.algorithm);
    let workers = args.count_workers.unwrap_or_else(Scanner::default_workers);
    let scanner = Scanner::new(algorithm, workers);

    let root = tokio::fs::canonicalize(&args.root_fs)
        .await
        .map_err(|e| MonitorError::Config(format!("root-fs {}: {e}", args.root_fs.display())))?;

    let mut hashes = Vec::new();
    for dir in &args.dirs {
        let target = root.join(dir.trim_start_matches('/'));
        let exists = tokio::fs::try_exists(&target)
            .await
            .map_err(|e| MonitorError::Config(format!("check {}: {e}", target.display())))?;
        if !exists {
            return Err(MonitorError::Config(format!(
                "dir {} does not exist",
                target.display()
            )));
        }

        let token = CancellationToken::new();
        let scan = scanner.scan(&[target.clone()], &token);
        match tokio::time::timeout(args.scan_dir_timeout, scan.collect()).await {
            Ok(result) => hashes.extend(result?),
            Err(_) => {
                token.cancel();
                return Err(MonitorError::Config(format!(
                    "scanning {} exceeded {:?}",
                    target.display(),
                    args.scan_dir_timeout
                )));
            }
        }
    }

    let reference = Snapshot::from_scan(hashes, &root)?;
    tokio::fs::write(&args.out, reference.serialize()).await?;
    info!(
        files = reference.len(),
        out = %args.out.display(),
        "snapshot written"
    );
    Ok(())
}
