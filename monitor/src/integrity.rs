use alerts::{REASON_FILE_DELETED, REASON_FILE_MISMATCH, REASON_NEW_FILE};

/// The three ways a check pass can diverge from the reference snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityKind {
    FileMismatch,
    NewFile,
    FileDeleted,
}

impl IntegrityKind {
    /// Stable reason string carried in alerts.
    pub fn reason(self) -> &'static str {
        match self {
            Self::FileMismatch => REASON_FILE_MISMATCH,
            Self::NewFile => REASON_NEW_FILE,
            Self::FileDeleted => REASON_FILE_DELETED,
        }
    }
}

/// One integrity violation. A pass surfaces at most one of these: the
/// first divergence decides the pass, and one violation maps to one
/// restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityError {
    pub kind: IntegrityKind,
    /// Path relative to the monitored root.
    pub path: String,
    /// Hash observed at check time; for deletions, the expected hash.
    pub hash: String,
}

impl std::fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.reason(), self.path)
    }
}

impl std::error::Error for IntegrityError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_reason_and_path() {
        let err = IntegrityError {
            kind: IntegrityKind::FileMismatch,
            path: "etc/hello".into(),
            hash: "abcd".into(),
        };
        assert_eq!(err.to_string(), "file content mismatch: etc/hello");
    }

    #[test]
    fn reasons_match_the_alert_constants() {
        assert_eq!(IntegrityKind::NewFile.reason(), "new file found");
        assert_eq!(IntegrityKind::FileDeleted.reason(), "file deleted");
    }
}
