//! Directory Listing
//!
//! Turns one directory into an ordered `Vec<Entry>` ready to be handed to a
//! list controller as a snapshot.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::capability::CapabilityProvider;
use crate::entry::Entry;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Modified,
    Size,
    Type,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListOptions {
    pub show_hidden: bool,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub folders_first: bool,
    /// Mark every listed entry as living in a virtual namespace
    pub virtual_namespace: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            sort_by: SortBy::Name,
            sort_order: SortOrder::Ascending,
            folders_first: true,
            virtual_namespace: false,
        }
    }
}

pub struct DirectoryLister {
    options: ListOptions,
    capabilities: Arc<dyn CapabilityProvider>,
}

impl DirectoryLister {
    pub fn new(options: ListOptions, capabilities: Arc<dyn CapabilityProvider>) -> Self {
        Self { options, capabilities }
    }

    pub fn options(&self) -> &ListOptions {
        &self.options
    }

    /// List the direct children of `dir`. Children that vanish or cannot be
    /// inspected mid-listing are skipped.
    pub fn list(&self, dir: &Path) -> Result<Vec<Entry>> {
        if !dir.is_dir() {
            anyhow::bail!("Not a directory: {:?}", dir);
        }
        let mut entries = Vec::new();
        for walked in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
            let walked = match walked {
                Ok(walked) => walked,
                // The directory itself could not be read
                Err(e) if e.depth() == 0 => {
                    return Err(e).with_context(|| format!("Failed to read directory {:?}", dir));
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                    continue;
                }
            };

            if !self.options.show_hidden && is_hidden(walked.file_name()) {
                continue;
            }

            match Entry::from_path(walked.path(), self.capabilities.as_ref()) {
                Ok(entry) => entries.push(entry.with_virtual(self.options.virtual_namespace)),
                Err(e) => tracing::warn!("Skipping {:?}: {}", walked.path(), e),
            }
        }

        entries.sort_by(|a, b| self.compare(a, b));
        tracing::debug!("Listed {} entries in {:?}", entries.len(), dir);
        Ok(entries)
    }

    fn compare(&self, a: &Entry, b: &Entry) -> Ordering {
        if self.options.folders_first && a.is_dir() != b.is_dir() {
            return if a.is_dir() { Ordering::Less } else { Ordering::Greater };
        }

        let by_name = || a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase());
        let ordering = match self.options.sort_by {
            SortBy::Name => by_name(),
            SortBy::Modified => a.last_modified.cmp(&b.last_modified).then_with(by_name),
            SortBy::Size => a.size_bytes.cmp(&b.size_bytes).then_with(by_name),
            SortBy::Type => a.extension().cmp(&b.extension()).then_with(by_name),
        };

        match self.options.sort_order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::NativeCapabilities;
    use tempfile::TempDir;

    fn populate() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.txt"), "12345").unwrap();
        std::fs::write(temp_dir.path().join("A.md"), "1").unwrap();
        std::fs::write(temp_dir.path().join(".hidden"), "").unwrap();
        std::fs::create_dir(temp_dir.path().join("zeta")).unwrap();
        temp_dir
    }

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.display_name.as_str()).collect()
    }

    #[test]
    fn test_default_listing_puts_folders_first() {
        let temp_dir = populate();
        let lister = DirectoryLister::new(ListOptions::default(), Arc::new(NativeCapabilities));
        let entries = lister.list(temp_dir.path()).unwrap();
        assert_eq!(names(&entries), vec!["zeta", "A.md", "b.txt"]);
    }

    #[test]
    fn test_hidden_and_size_descending() {
        let temp_dir = populate();
        let options = ListOptions {
            show_hidden: true,
            sort_by: SortBy::Size,
            sort_order: SortOrder::Descending,
            folders_first: false,
            virtual_namespace: true,
        };
        let lister = DirectoryLister::new(options, Arc::new(NativeCapabilities));
        let entries = lister.list(temp_dir.path()).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].display_name, "b.txt");
        assert!(entries.iter().all(|e| e.is_virtual));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_fails() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = populate();
        let locked = temp_dir.path().join("zeta");
        std::fs::write(locked.join("inside.txt"), "").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let lister = DirectoryLister::new(ListOptions::default(), Arc::new(NativeCapabilities));
        let listed = lister.list(&locked);
        let readable_anyway = std::fs::read_dir(&locked).is_ok();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Privileged users read through the mode bits
        if !readable_anyway {
            let error = listed.unwrap_err();
            assert!(format!("{error:#}").contains("Failed to read directory"));
        }
    }

    #[test]
    fn test_listing_a_file_fails() {
        let temp_dir = populate();
        let lister = DirectoryLister::new(ListOptions::default(), Arc::new(NativeCapabilities));
        assert!(lister.list(&temp_dir.path().join("b.txt")).is_err());
    }
}
