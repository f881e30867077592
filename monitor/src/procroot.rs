use std::path::{Path, PathBuf};

use crate::error::{MonitorError, MonitorResult};

/// Resolves a process name to the process's root-filesystem view under
/// procfs. Resolution happens on every pass: PIDs change whenever the
/// monitored container restarts.
#[derive(Debug, Clone)]
pub struct ProcessRoots {
    proc_dir: PathBuf,
}

impl Default for ProcessRoots {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRoots {
    pub fn new() -> Self {
        Self {
            proc_dir: PathBuf::from("/proc"),
        }
    }

    /// Use a different procfs base, for tests.
    pub fn with_base(proc_dir: impl Into<PathBuf>) -> Self {
        Self {
            proc_dir: proc_dir.into(),
        }
    }

    /// Find the PID of `process_name` by scanning the process table. When
    /// several processes share the name the smallest PID wins, which is the
    /// longest-lived instance.
    pub async fn find_pid(&self, process_name: &str) -> MonitorResult<u32> {
        let mut entries = tokio::fs::read_dir(&self.proc_dir).await.map_err(|e| {
            MonitorError::Config(format!("read {}: {e}", self.proc_dir.display()))
        })?;

        let mut found: Option<u32> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MonitorError::Config(format!("scan process table: {e}")))?
        {
            let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
                continue;
            };
            // Processes may exit mid-scan; unreadable entries are skipped.
            let Ok(comm) = tokio::fs::read_to_string(entry.path().join("comm")).await else {
                continue;
            };
            if comm.trim() == process_name {
                found = Some(found.map_or(pid, |best| best.min(pid)));
            }
        }

        found.ok_or_else(|| MonitorError::ProcessNotFound {
            name: process_name.to_string(),
        })
    }

    /// Root-filesystem view of the named process.
    pub async fn resolve(&self, process_name: &str) -> MonitorResult<PathBuf> {
        let pid = self.find_pid(process_name).await?;
        Ok(self.root_of(pid))
    }

    fn root_of(&self, pid: u32) -> PathBuf {
        self.proc_dir.join(pid.to_string()).join("root")
    }

    /// Absolute scan roots for a target's relative paths beneath the
    /// process root.
    pub fn scan_roots(process_root: &Path, relative_paths: &[String]) -> Vec<PathBuf> {
        relative_paths
            .iter()
            .map(|p| process_root.join(p.trim_start_matches('/')))
            .collect()
    }
}
