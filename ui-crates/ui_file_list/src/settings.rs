//! File list settings
//!
//! Stored as TOML. Every field has a default, so a partial file is fine.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use fm_fs::{ListOptions, SortBy, SortOrder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::gate::GateMode;

const SETTINGS_FILE: &str = "file_list.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileListSettings {
    pub worker_threads: usize,
    pub show_hidden: bool,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub folders_first: bool,
    pub virtual_namespace: bool,
    /// Reload automatically when the listed directory changes
    pub watch: bool,
}

impl Default for FileListSettings {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            show_hidden: false,
            sort_by: SortBy::Name,
            sort_order: SortOrder::Ascending,
            folders_first: true,
            virtual_namespace: false,
            watch: false,
        }
    }
}

impl FileListSettings {
    /// Settings file in the platform config directory, if one exists.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "FileList", "file_list")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {:?}", path))?;
        let settings: Self = toml::from_str(&contents)
            .with_context(|| format!("Invalid settings file {:?}", path))?;
        Ok(settings.normalized())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write settings {:?}", path))?;
        Ok(())
    }

    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            show_hidden: self.show_hidden,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            folders_first: self.folders_first,
            virtual_namespace: self.virtual_namespace,
        }
    }

    pub fn gate_mode(&self) -> GateMode {
        GateMode {
            virtual_namespace: self.virtual_namespace,
        }
    }

    fn normalized(mut self) -> Self {
        self.worker_threads = self.worker_threads.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = FileListSettings::load(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings, FileListSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file_list.toml");
        std::fs::write(&path, "sort_by = \"size\"\nworker_threads = 0\n").unwrap();

        let settings = FileListSettings::load(&path).unwrap();
        assert_eq!(settings.sort_by, SortBy::Size);
        assert_eq!(settings.worker_threads, 1);
        assert!(settings.folders_first);
        assert_eq!(settings.list_options().sort_by, SortBy::Size);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file_list.toml");
        std::fs::write(&path, "sort_by = 42").unwrap();
        assert!(FileListSettings::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/file_list.toml");
        let settings = FileListSettings {
            show_hidden: true,
            virtual_namespace: true,
            ..FileListSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(FileListSettings::load(&path).unwrap(), settings);
        assert!(settings.gate_mode().virtual_namespace);
    }
}
