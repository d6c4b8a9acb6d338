//! File Manager Filesystem Layer
//!
//! Everything that touches storage for the file listing core: the `Entry`
//! snapshot model, live capability checks, the storage backend seam, the
//! rename/delete executor, directory listing and directory watching.

pub mod capability;
pub mod entry;
pub mod error;
pub mod lister;
pub mod operations;
pub mod store;
pub mod watchers;

pub use capability::{Capabilities, CapabilityProvider, NativeCapabilities};
pub use entry::{Entry, EntryKind, Identity};
pub use error::OpError;
pub use lister::{DirectoryLister, ListOptions, SortBy, SortOrder};
pub use operations::{FileOperations, OperationKind};
pub use store::{FileStore, NativeStore};
pub use watchers::{watch_directory, DirectoryWatcher};
