use fm_fs::{Entry, Identity, OpError};
use std::time::SystemTime;

use crate::gate::{FileAction, PermittedActions};
use crate::icons::IconTag;

// ============================================================================
// WORKER MESSAGES - Results travelling back to the primary context
// ============================================================================

#[derive(Debug)]
pub enum WorkerMessage {
    IconResolved {
        identity: Identity,
        fingerprint: u64,
        result: Result<IconTag, String>,
    },
    OperationFinished {
        identity: Identity,
        action: FileAction,
        result: Result<OperationDone, OpError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationDone {
    Renamed(Entry),
    Deleted,
}

// ============================================================================
// UPDATES - What the presentation layer needs to react to
// ============================================================================

#[derive(Debug)]
pub enum FileListUpdate {
    IconReady {
        identity: Identity,
        tag: IconTag,
    },
    OperationSucceeded {
        identity: Identity,
        action: FileAction,
        done: OperationDone,
    },
    OperationFailed {
        identity: Identity,
        action: FileAction,
        error: OpError,
    },
}

/// Result of activating (clicking) a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// A directory: the loader was asked for its children
    Navigated(Identity),
    /// A file: the presentation layer should offer "open with"
    OpenWith(Entry),
}

/// Proof that the user confirmed a delete. Only the presentation layer
/// creates one, right after its confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteConfirmation(());

impl DeleteConfirmation {
    pub fn confirmed_by_user() -> Self {
        Self(())
    }
}

/// Identities staged by cut/copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clipboard {
    pub identities: Vec<Identity>,
    pub is_cut: bool,
}

/// Raw values for rendering one row. Formatting is up to the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RowModel {
    pub identity: Identity,
    pub title: String,
    pub is_directory: bool,
    pub is_symlink: bool,
    /// Child count for directories, byte size for files
    pub detail: u64,
    pub modified: Option<SystemTime>,
    pub selected: bool,
    pub icon: Option<IconTag>,
    pub actions: PermittedActions,
}

/// Join a rename prompt's prefix and extension back into a file name.
pub fn compose_file_name(prefix: &str, extension: &str) -> String {
    if extension.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}.{extension}")
    }
}
