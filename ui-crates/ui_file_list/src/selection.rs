use fm_fs::Identity;
use std::collections::HashSet;

// ============================================================================
// SELECTION TRACKER - Identity key-set, independent of list order
// ============================================================================

/// Set of selected identities.
///
/// Holds keys only. Entries are replaced wholesale on every reload, so the
/// tracker must never keep one alive.
#[derive(Clone, Debug, Default)]
pub struct SelectionTracker {
    selected: HashSet<Identity>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership and return the new state.
    pub fn toggle(&mut self, identity: &Identity) -> bool {
        if self.selected.remove(identity) {
            false
        } else {
            self.selected.insert(identity.clone());
            true
        }
    }

    pub fn select(&mut self, identity: &Identity) -> bool {
        self.selected.insert(identity.clone())
    }

    pub fn deselect(&mut self, identity: &Identity) -> bool {
        self.selected.remove(identity)
    }

    pub fn is_selected(&self, identity: &Identity) -> bool {
        self.selected.contains(identity)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop every selected identity that is not in `valid`. Returns how many
    /// were dropped.
    pub fn reconcile(&mut self, valid: &HashSet<Identity>) -> usize {
        let before = self.selected.len();
        self.selected.retain(|identity| valid.contains(identity));
        before - self.selected.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.selected.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(key: &str) -> Identity {
        Identity::new(key)
    }

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let mut tracker = SelectionTracker::new();
        assert!(tracker.toggle(&id("/a")));
        assert!(tracker.is_selected(&id("/a")));
        assert!(!tracker.toggle(&id("/a")));
        assert!(!tracker.is_selected(&id("/a")));
        assert_eq!(tracker.selected_count(), 0);
    }

    #[test]
    fn test_reconcile_drops_missing() {
        let mut tracker = SelectionTracker::new();
        tracker.select(&id("/a"));
        tracker.select(&id("/b"));
        tracker.select(&id("/c"));

        let valid: HashSet<Identity> = [id("/b"), id("/z")].into_iter().collect();
        assert_eq!(tracker.reconcile(&valid), 2);
        assert_eq!(tracker.selected_count(), 1);
        assert!(tracker.is_selected(&id("/b")));
        assert!(!tracker.is_selected(&id("/z")));
    }

    #[test]
    fn test_clear() {
        let mut tracker = SelectionTracker::new();
        tracker.select(&id("/a"));
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
