use std::collections::BTreeMap;
use std::path::Path;

use scanner::FileHash;

use crate::error::{SnapshotError, SnapshotResult};

/// Hash and path are separated by exactly two spaces, the classic
/// `shasum`-style record layout. The double space is load-bearing: paths may
/// contain single spaces.
const SEPARATOR: &str = "  ";

/// One `(relative path, hash)` pair of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub path: String,
    pub hash: String,
}

/// A reference snapshot: the set of files beneath the monitored roots and
/// their digests at capture time. Parsing preserves record order;
/// serialisation sorts by path so stored objects are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self { entries }
    }

    /// Build a snapshot from scan output, rewriting every absolute path to
    /// be relative to `root`. Stored paths never carry the process-root
    /// prefix so they stay valid across restarts of the target process.
    pub fn from_scan(hashes: Vec<FileHash>, root: &Path) -> SnapshotResult<Self> {
        let mut entries = Vec::with_capacity(hashes.len());
        for fh in hashes {
            let rel = relative_path(&fh.path, root)?;
            entries.push(SnapshotEntry {
                path: rel,
                hash: fh.hash,
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path → expected hash, the lookup table the comparison pass consumes.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.path.clone(), e.hash.clone()))
            .collect()
    }

    /// Canonical text form: one `<hex>  <path>` line per entry, sorted
    /// lexicographically by path, LF-terminated.
    pub fn serialize(&self) -> String {
        let mut sorted: Vec<&SnapshotEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));
        let mut out = String::new();
        for entry in sorted {
            out.push_str(&entry.hash);
            out.push_str(SEPARATOR);
            out.push_str(&entry.path);
            out.push('\n');
        }
        out
    }

    /// Parse snapshot text. Every line must be a well-formed record; empty
    /// lines and empty fields are rejected.
    pub fn parse(data: &str) -> SnapshotResult<Self> {
        let mut entries = Vec::new();
        for line in data.lines() {
            entries.push(parse_record(line)?);
        }
        Ok(Self { entries })
    }
}

fn parse_record(record: &str) -> SnapshotResult<SnapshotEntry> {
    if record.is_empty() {
        return Err(SnapshotError::EmptyRecord);
    }
    let (hash, path) = record
        .split_once(SEPARATOR)
        .ok_or_else(|| SnapshotError::MalformedRecord {
            record: record.to_string(),
        })?;
    let hash = hash.trim();
    let path = path.trim();
    if hash.is_empty() || path.is_empty() {
        return Err(SnapshotError::MalformedRecord {
            record: record.to_string(),
        });
    }
    Ok(SnapshotEntry {
        path: path.to_string(),
        hash: hash.to_string(),
    })
}

/// Strip `root` from `path` and return the remainder as a forward-slash
/// relative string (no leading slash). The same rewrite is applied to live
/// hashes before lookup, so stored and observed paths compare equal.
pub fn relative_path(path: &Path, root: &Path) -> SnapshotResult<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| SnapshotError::OutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })?;
    rel.to_str()
        .map(str::to_string)
        .ok_or_else(|| SnapshotError::InvalidPath {
            path: path.to_path_buf(),
        })
}
