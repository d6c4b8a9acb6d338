//! Action Gate
//!
//! Decides which per-entry actions are enabled. Each action is checked on its
//! own against the entry's capabilities and namespace; unknown capabilities
//! deny every capability-gated action.

use fm_fs::{Capabilities, CapabilityProvider, Entry};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileAction {
    /// Open or open-with
    Open,
    Cut,
    Copy,
    Rename,
    Delete,
    Share,
    CreateShortcut,
    CopyPath,
    Properties,
}

impl FileAction {
    pub const ALL: [FileAction; 9] = [
        FileAction::Open,
        FileAction::Cut,
        FileAction::Copy,
        FileAction::Rename,
        FileAction::Delete,
        FileAction::Share,
        FileAction::CreateShortcut,
        FileAction::CopyPath,
        FileAction::Properties,
    ];

    fn bit(self) -> u16 {
        1 << self as u16
    }

    fn permitted(self, capabilities: Option<Capabilities>, native: bool) -> bool {
        match (self, capabilities) {
            (FileAction::CopyPath | FileAction::Properties, _) => true,
            // Unknown capability denies everything else
            (_, None) => false,
            (FileAction::Open | FileAction::Copy | FileAction::Share, Some(caps)) => caps.read,
            (FileAction::Cut | FileAction::Rename | FileAction::Delete, Some(caps)) => {
                caps.read && caps.write
            }
            (FileAction::CreateShortcut, Some(_)) => native,
        }
    }
}

/// Set of permitted actions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PermittedActions(u16);

impl PermittedActions {
    pub const NONE: Self = Self(0);

    pub fn all() -> Self {
        FileAction::ALL.into_iter().collect()
    }

    pub fn contains(&self, action: FileAction) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn insert(&mut self, action: FileAction) {
        self.0 |= action.bit();
    }

    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = FileAction> + '_ {
        FileAction::ALL.into_iter().filter(move |action| self.contains(*action))
    }
}

impl FromIterator<FileAction> for PermittedActions {
    fn from_iter<I: IntoIterator<Item = FileAction>>(iter: I) -> Self {
        let mut permitted = Self::NONE;
        for action in iter {
            permitted.insert(action);
        }
        permitted
    }
}

/// Global mode of the listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateMode {
    /// The whole listing is a virtual filesystem
    pub virtual_namespace: bool,
}

pub struct ActionGate;

impl ActionGate {
    /// Decide from the capabilities recorded on the entry.
    pub fn permitted(entry: &Entry, mode: GateMode) -> PermittedActions {
        Self::decide(entry, entry.capabilities, mode)
    }

    /// Re-query the provider and decide from the live answer. A provider
    /// failure counts as unknown capability.
    pub fn evaluate(
        entry: &Entry,
        mode: GateMode,
        provider: &dyn CapabilityProvider,
    ) -> PermittedActions {
        let live = match provider.capabilities(&entry.path) {
            Ok(caps) => Some(caps),
            Err(e) => {
                tracing::debug!("Capability check failed for {}: {}", entry.identity, e);
                None
            }
        };
        Self::decide(entry, live, mode)
    }

    /// Actions permitted for every entry of a multi-selection.
    pub fn permitted_for_all(
        entries: &[Entry],
        mode: GateMode,
        provider: &dyn CapabilityProvider,
    ) -> PermittedActions {
        if entries.is_empty() {
            return PermittedActions::NONE;
        }
        entries
            .iter()
            .map(|entry| Self::evaluate(entry, mode, provider))
            .fold(PermittedActions::all(), PermittedActions::intersection)
    }

    fn decide(
        entry: &Entry,
        capabilities: Option<Capabilities>,
        mode: GateMode,
    ) -> PermittedActions {
        let native = !(entry.is_virtual || mode.virtual_namespace);
        FileAction::ALL
            .into_iter()
            .filter(|action| action.permitted(capabilities, native))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fm_fs::{EntryKind, Identity};
    use std::io;
    use std::path::{Path, PathBuf};

    fn file(caps: Option<Capabilities>) -> Entry {
        let entry = Entry::new(Identity::new("/f"), PathBuf::from("/f"), "f", EntryKind::File);
        match caps {
            Some(caps) => entry.with_capabilities(caps),
            None => entry,
        }
    }

    struct Broken;

    impl CapabilityProvider for Broken {
        fn capabilities(&self, _path: &Path) -> io::Result<Capabilities> {
            Err(io::Error::other("stat failed"))
        }
    }

    #[test]
    fn test_read_write_permits_everything_natively() {
        let permitted =
            ActionGate::permitted(&file(Some(Capabilities::READ_WRITE)), GateMode::default());
        assert_eq!(permitted, PermittedActions::all());
    }

    #[test]
    fn test_read_only() {
        let permitted =
            ActionGate::permitted(&file(Some(Capabilities::READ_ONLY)), GateMode::default());
        for action in [
            FileAction::Open,
            FileAction::Copy,
            FileAction::Share,
            FileAction::CopyPath,
            FileAction::Properties,
            FileAction::CreateShortcut,
        ] {
            assert!(permitted.contains(action), "{action:?}");
        }
        for action in [FileAction::Cut, FileAction::Rename, FileAction::Delete] {
            assert!(!permitted.contains(action), "{action:?}");
        }
    }

    #[test]
    fn test_write_without_read_is_not_enough() {
        let caps = Capabilities { read: false, write: true };
        let permitted = ActionGate::permitted(&file(Some(caps)), GateMode::default());
        assert!(!permitted.contains(FileAction::Rename));
        assert!(!permitted.contains(FileAction::Open));
    }

    #[test]
    fn test_unknown_capability_fails_closed() {
        let permitted = ActionGate::permitted(&file(None), GateMode::default());
        assert_eq!(
            permitted.iter().collect::<Vec<_>>(),
            vec![FileAction::CopyPath, FileAction::Properties]
        );

        let readable = file(Some(Capabilities::READ_WRITE));
        let live = ActionGate::evaluate(&readable, GateMode::default(), &Broken);
        assert!(!live.contains(FileAction::Cut));
        assert!(!live.contains(FileAction::Rename));
        assert!(!live.contains(FileAction::Delete));
    }

    #[test]
    fn test_virtual_namespace_disables_shortcuts() {
        let entry = file(Some(Capabilities::READ_WRITE));
        let global = ActionGate::permitted(&entry, GateMode { virtual_namespace: true });
        assert!(!global.contains(FileAction::CreateShortcut));

        let flagged = ActionGate::permitted(&entry.with_virtual(true), GateMode::default());
        assert!(!flagged.contains(FileAction::CreateShortcut));
        assert!(flagged.contains(FileAction::Rename));
    }

    #[test]
    fn test_multi_selection_intersects() {
        struct ByName;
        impl CapabilityProvider for ByName {
            fn capabilities(&self, path: &Path) -> io::Result<Capabilities> {
                Ok(if path.ends_with("ro") {
                    Capabilities::READ_ONLY
                } else {
                    Capabilities::READ_WRITE
                })
            }
        }

        let rw = Entry::new(Identity::new("/rw"), PathBuf::from("/rw"), "rw", EntryKind::File);
        let ro = Entry::new(Identity::new("/ro"), PathBuf::from("/ro"), "ro", EntryKind::File);

        let both = ActionGate::permitted_for_all(&[rw.clone(), ro], GateMode::default(), &ByName);
        assert!(both.contains(FileAction::Copy));
        assert!(!both.contains(FileAction::Delete));

        let single = ActionGate::permitted_for_all(&[rw], GateMode::default(), &ByName);
        assert!(single.contains(FileAction::Delete));
        assert!(ActionGate::permitted_for_all(&[], GateMode::default(), &ByName).is_empty());
    }
}
