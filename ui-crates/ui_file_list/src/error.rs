use fm_fs::Identity;
use thiserror::Error;

use crate::gate::FileAction;

/// Row access outside the current snapshot. Always a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("Row {index} is out of range (count {count})")]
    OutOfRange { index: usize, count: usize },
}

#[derive(Debug, Error)]
pub enum FileListError {
    #[error(transparent)]
    List(#[from] ListError),

    #[error("{action:?} is not permitted for {identity}")]
    NotPermitted { action: FileAction, identity: Identity },

    #[error("Nothing is selected")]
    EmptySelection,

    #[error("Worker pool is shut down")]
    WorkerUnavailable,
}
