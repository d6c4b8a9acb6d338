//! File Operations
//!
//! Rename and delete with conflict detection, execution-time capability
//! checks and a per-identity busy set. Both calls block until storage
//! answers, so they belong on a worker thread.

use dashmap::mapref::entry::Entry as Slot;
use dashmap::DashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::capability::{CapabilityProvider, NativeCapabilities};
use crate::entry::{Entry, Identity};
use crate::error::OpError;
use crate::store::{FileStore, NativeStore};

const INVALID_NAME_CHARS: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Rename,
    Delete,
}

/// Releases the identity from the busy set when dropped.
struct BusyGuard<'a> {
    busy: &'a DashMap<Identity, OperationKind>,
    identity: Identity,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.remove(&self.identity);
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DeleteTally {
    removed: usize,
    remaining: usize,
}

/// Executes rename/delete against a `FileStore`.
pub struct FileOperations {
    store: Arc<dyn FileStore>,
    capabilities: Arc<dyn CapabilityProvider>,
    busy: DashMap<Identity, OperationKind>,
}

impl FileOperations {
    pub fn new(store: Arc<dyn FileStore>, capabilities: Arc<dyn CapabilityProvider>) -> Self {
        Self {
            store,
            capabilities,
            busy: DashMap::new(),
        }
    }

    pub fn native() -> Self {
        Self::new(Arc::new(NativeStore), Arc::new(NativeCapabilities))
    }

    pub fn is_busy(&self, identity: &Identity) -> bool {
        self.busy.contains_key(identity)
    }

    /// Rename `entry` within its parent directory.
    ///
    /// Returns the renamed entry. The caller is responsible for reloading the
    /// listing; nothing here touches a snapshot.
    pub fn rename(&self, entry: &Entry, new_name: &str) -> Result<Entry, OpError> {
        let new_name = validate_name(new_name)?;
        if new_name == entry.display_name {
            return Ok(entry.clone());
        }

        let _guard = self.acquire(&entry.identity, OperationKind::Rename)?;
        self.ensure_writable(entry)?;

        let parent = entry
            .path
            .parent()
            .ok_or_else(|| OpError::InvalidName(entry.display_name.clone()))?;
        let target = parent.join(new_name);

        if self.store.exists(&target) {
            tracing::warn!("Rename of {} rejected: '{}' already exists", entry.identity, new_name);
            return Err(OpError::Conflict {
                name: new_name.to_string(),
            });
        }

        self.store.rename(&entry.path, &target).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => OpError::classify(e, &target),
            _ => OpError::classify(e, &entry.path),
        })?;

        tracing::info!("Renamed {:?} -> {:?}", entry.path, target);
        Ok(entry.renamed(target, new_name))
    }

    /// Delete `entry`, recursively for directories.
    ///
    /// Confirmation must already have been obtained. Deletion keeps going past
    /// children that fail and reports `PartialFailure` if anything is left.
    /// Calling it again on the leftovers resumes where it stopped.
    pub fn delete(&self, entry: &Entry) -> Result<(), OpError> {
        let _guard = self.acquire(&entry.identity, OperationKind::Delete)?;

        if !self.store.exists(&entry.path) {
            tracing::debug!("Delete of {} skipped: already gone", entry.identity);
            return Ok(());
        }

        self.ensure_writable(entry)?;

        if !self.store.is_dir(&entry.path) {
            self.store
                .remove_file(&entry.path)
                .map_err(|e| OpError::classify(e, &entry.path))?;
            tracing::info!("Deleted {:?}", entry.path);
            return Ok(());
        }

        let tally = self
            .delete_children(&entry.path)
            .map_err(|e| OpError::classify(e, &entry.path))?;

        if tally.remaining > 0 {
            tracing::warn!(
                "Delete of {:?} incomplete: {} removed, {} remaining",
                entry.path,
                tally.removed,
                tally.remaining
            );
            return Err(OpError::PartialFailure {
                removed: tally.removed,
                remaining: tally.remaining,
            });
        }

        match self.store.remove_dir(&entry.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(OpError::classify(e, &entry.path)),
        }

        tracing::info!("Deleted {:?} ({} entries inside)", entry.path, tally.removed);
        Ok(())
    }

    fn acquire(&self, identity: &Identity, kind: OperationKind) -> Result<BusyGuard<'_>, OpError> {
        match self.busy.entry(identity.clone()) {
            Slot::Occupied(running) => {
                tracing::warn!(
                    "{:?} of {} rejected: {:?} still running",
                    kind,
                    identity,
                    running.get()
                );
                Err(OpError::Busy {
                    identity: identity.clone(),
                })
            }
            Slot::Vacant(slot) => {
                slot.insert(kind);
                Ok(BusyGuard {
                    busy: &self.busy,
                    identity: identity.clone(),
                })
            }
        }
    }

    /// Capability flags on the entry may be stale; ask again.
    fn ensure_writable(&self, entry: &Entry) -> Result<(), OpError> {
        match self.capabilities.capabilities(&entry.path) {
            Ok(caps) if caps.read && caps.write => Ok(()),
            Ok(_) => Err(OpError::Denied {
                path: entry.path.clone(),
            }),
            Err(e) => Err(OpError::classify(e, &entry.path)),
        }
    }

    fn delete_children(&self, dir: &Path) -> io::Result<DeleteTally> {
        let mut tally = DeleteTally::default();

        for child in self.store.list(dir)? {
            if self.store.is_dir(&child) {
                let nested = match self.delete_children(&child) {
                    Ok(nested) => nested,
                    Err(e) => {
                        tracing::error!("Failed to list {:?}: {}", child, e);
                        tally.remaining += 1;
                        continue;
                    }
                };
                tally.removed += nested.removed;
                tally.remaining += nested.remaining;

                if nested.remaining > 0 {
                    tally.remaining += 1;
                    continue;
                }
                self.remove_one(&child, self.store.remove_dir(&child), &mut tally);
            } else {
                self.remove_one(&child, self.store.remove_file(&child), &mut tally);
            }
        }

        Ok(tally)
    }

    fn remove_one(&self, path: &Path, result: io::Result<()>, tally: &mut DeleteTally) {
        match result {
            Ok(()) => tally.removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!("Failed to delete {:?}: {}", path, e);
                tally.remaining += 1;
            }
        }
    }
}

/// Trimmed name, or `InvalidName`.
pub fn validate_name(name: &str) -> Result<&str, OpError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(INVALID_NAME_CHARS)
    {
        return Err(OpError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}
