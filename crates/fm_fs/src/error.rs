use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::entry::Identity;

/// Errors returned by rename/delete. Always values, never panics.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("Permission denied for {path:?}")]
    Denied { path: PathBuf },

    #[error("An entry named '{name}' already exists")]
    Conflict { name: String },

    #[error("Delete incomplete: {removed} removed, {remaining} remaining")]
    PartialFailure { removed: usize, remaining: usize },

    #[error("Invalid name: '{0}'")]
    InvalidName(String),

    #[error("Another operation is already running for {identity}")]
    Busy { identity: Identity },

    #[error("I/O failure: {0}")]
    IoFailure(#[from] io::Error),
}

impl OpError {
    /// Map a storage error onto the operation taxonomy.
    pub fn classify(error: io::Error, path: &std::path::Path) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => OpError::Denied {
                path: path.to_path_buf(),
            },
            io::ErrorKind::AlreadyExists => OpError::Conflict {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            },
            _ => OpError::IoFailure(error),
        }
    }

    /// Whether this is an unexpected storage failure rather than a
    /// user-facing refusal.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, OpError::IoFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_classify() {
        let path = Path::new("/tmp/x/report.txt");
        assert!(matches!(
            OpError::classify(io::Error::from(io::ErrorKind::PermissionDenied), path),
            OpError::Denied { .. }
        ));
        match OpError::classify(io::Error::from(io::ErrorKind::AlreadyExists), path) {
            OpError::Conflict { name } => assert_eq!(name, "report.txt"),
            other => panic!("unexpected {other:?}"),
        }
        let io = OpError::classify(io::Error::other("disk on fire"), path);
        assert!(io.is_unexpected());
    }
}
