//! Live read/write capability checks
//!
//! Capabilities are re-queried whenever a decision depends on them. The
//! flags stored on an `Entry` are only as fresh as the snapshot.

use std::io;
use std::path::Path;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
}

impl Capabilities {
    pub const READ_WRITE: Self = Self { read: true, write: true };
    pub const READ_ONLY: Self = Self { read: true, write: false };
    pub const NONE: Self = Self { read: false, write: false };
}

/// Authoritative source of read/write capability for a path.
pub trait CapabilityProvider: Send + Sync {
    fn capabilities(&self, path: &Path) -> io::Result<Capabilities>;
}

/// Queries the native filesystem.
///
/// Readability is tested by actually opening the node, writability through
/// the permission bits of the node itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeCapabilities;

impl CapabilityProvider for NativeCapabilities {
    fn capabilities(&self, path: &Path) -> io::Result<Capabilities> {
        let metadata = std::fs::metadata(path)?;

        let opened = if metadata.is_dir() {
            std::fs::read_dir(path).map(|_| ())
        } else {
            std::fs::File::open(path).map(|_| ())
        };
        let read = match opened {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => false,
            Err(e) => return Err(e),
        };

        Ok(Capabilities {
            read,
            write: !metadata.permissions().readonly(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writable_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let caps = NativeCapabilities.capabilities(&file).unwrap();
        assert_eq!(caps, Capabilities::READ_WRITE);
    }

    #[test]
    fn test_readonly_bit_clears_write() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("locked.txt");
        std::fs::write(&file, "a").unwrap();
        let mut perms = std::fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&file, perms).unwrap();

        let caps = NativeCapabilities.capabilities(&file).unwrap();
        assert!(caps.read);
        assert!(!caps.write);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(NativeCapabilities.capabilities(&temp_dir.path().join("gone")).is_err());
    }
}
