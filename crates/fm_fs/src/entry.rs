use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::capability::{Capabilities, CapabilityProvider};

// ============================================================================
// IDENTITY - Stable key for an entry across reloads
// ============================================================================

/// Opaque, cheaply clonable key for one filesystem node.
///
/// Native identities are the canonical parent directory joined with the
/// node's own name. Links are not resolved, so a symlink and its target are
/// two different identities.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Arc<str>);

impl Identity {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Derive the identity of a native path.
    pub fn for_path(path: &Path) -> Self {
        let canonical = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => {
                let parent = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
                parent
                    .canonicalize()
                    .map(|p| p.join(name))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
            _ => path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
        };
        Self(canonical.to_string_lossy().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity read back as a path. Only meaningful for native entries.
    pub fn as_path(&self) -> &Path {
        Path::new(&*self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// ENTRY - Immutable snapshot of one node
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub identity: Identity,
    pub path: PathBuf,
    pub display_name: String,
    pub kind: EntryKind,
    pub is_symlink: bool,
    /// Only meaningful for files
    pub size_bytes: u64,
    /// Only meaningful for directories
    pub child_count: usize,
    pub last_modified: Option<SystemTime>,
    /// `None` when the capability provider could not answer
    pub capabilities: Option<Capabilities>,
    pub is_virtual: bool,
}

impl Entry {
    pub fn new(
        identity: Identity,
        path: PathBuf,
        display_name: impl Into<String>,
        kind: EntryKind,
    ) -> Self {
        Self {
            identity,
            path,
            display_name: display_name.into(),
            kind,
            is_symlink: false,
            size_bytes: 0,
            child_count: 0,
            last_modified: None,
            capabilities: None,
            is_virtual: false,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_child_count(mut self, child_count: usize) -> Self {
        self.child_count = child_count;
        self
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.last_modified = Some(modified);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_symlink(mut self, is_symlink: bool) -> Self {
        self.is_symlink = is_symlink;
        self
    }

    pub fn with_virtual(mut self, is_virtual: bool) -> Self {
        self.is_virtual = is_virtual;
        self
    }

    /// Snapshot a native path. Capabilities come from `provider`; a provider
    /// failure leaves them unknown rather than failing the whole entry.
    pub fn from_path(path: &Path, provider: &dyn CapabilityProvider) -> std::io::Result<Self> {
        let link_metadata = std::fs::symlink_metadata(path)?;
        let is_symlink = link_metadata.file_type().is_symlink();
        let metadata = if is_symlink {
            // Dangling links keep the link's own metadata
            match std::fs::metadata(path) {
                Ok(target) => target,
                Err(_) => link_metadata,
            }
        } else {
            link_metadata
        };

        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let child_count = match kind {
            EntryKind::Directory => std::fs::read_dir(path).map(|it| it.count()).unwrap_or(0),
            EntryKind::File => 0,
        };

        let capabilities = match provider.capabilities(path) {
            Ok(capabilities) => Some(capabilities),
            Err(e) => {
                tracing::debug!("Capabilities unavailable for {:?}: {}", path, e);
                None
            }
        };

        Ok(Self {
            identity: Identity::for_path(path),
            path: path.to_path_buf(),
            display_name,
            kind,
            is_symlink,
            size_bytes: if kind == EntryKind::File { metadata.len() } else { 0 },
            child_count,
            last_modified: metadata.modified().ok(),
            capabilities,
            is_virtual: false,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn can_read(&self) -> bool {
        self.capabilities.map(|c| c.read).unwrap_or(false)
    }

    pub fn can_write(&self) -> bool {
        self.capabilities.map(|c| c.write).unwrap_or(false)
    }

    /// Lower-cased extension of the display name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.display_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Changes whenever the node's content is likely to have changed.
    /// Used to invalidate cached icons.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.kind.hash(&mut hasher);
        self.size_bytes.hash(&mut hasher);
        self.last_modified.hash(&mut hasher);
        hasher.finish()
    }

    /// The same node after a successful rename.
    pub fn renamed(&self, new_path: PathBuf, new_name: &str) -> Self {
        let identity = if self.is_virtual {
            Identity::new(new_path.to_string_lossy().into_owned())
        } else {
            Identity::for_path(&new_path)
        };

        Self {
            identity,
            path: new_path,
            display_name: new_name.to_string(),
            ..self.clone()
        }
    }

    /// Path as shown to the user (copy-path).
    pub fn displayable_path(&self) -> String {
        if self.is_virtual {
            self.path.to_string_lossy().into_owned()
        } else {
            self.identity.to_string()
        }
    }
}
