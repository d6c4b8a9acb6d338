//! File List
//!
//! The list-and-action core of the file browser: an immutable snapshot of a
//! directory's entries, the selection over it, per-entry action gating, and
//! rename/delete/icon work dispatched to workers. Rendering is left to a
//! presentation adapter that reads `RowModel`s and drains `FileListUpdate`s.

pub mod controller;
pub mod error;
pub mod gate;
pub mod icons;
pub mod list;
pub mod loader;
pub mod selection;
pub mod settings;
pub mod types;
pub mod worker;

// Re-export main types
pub use controller::FileListController;
pub use error::{FileListError, ListError};
pub use gate::{ActionGate, FileAction, GateMode, PermittedActions};
pub use icons::{IconCache, IconDispatcher, IconRequest, IconResolver, IconTag, KindIconResolver};
pub use list::{ListController, ListEvent, ListSnapshot};
pub use loader::{DirectoryLoader, Loader};
pub use selection::SelectionTracker;
pub use settings::FileListSettings;
pub use types::*;
pub use worker::WorkerPool;
