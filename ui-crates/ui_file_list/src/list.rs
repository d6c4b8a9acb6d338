//! List Controller
//!
//! Owns the ordered entry snapshot and the selection that must stay
//! consistent with it. The snapshot is immutable and swapped as a whole, so a
//! reader either sees the old listing or the new one, never a mix.

use crossbeam_channel::{unbounded, Receiver, Sender};
use fm_fs::{Entry, Identity};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ListError;
use crate::selection::SelectionTracker;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// One immutable, ordered listing.
#[derive(Debug, Default)]
pub struct ListSnapshot {
    generation: u64,
    entries: Vec<Entry>,
    index: HashMap<Identity, usize>,
}

impl ListSnapshot {
    fn build(generation: u64, entries: Vec<Entry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if index.contains_key(&entry.identity) {
                // Loader contract violation; first occurrence keeps the key
                tracing::warn!("Duplicate identity in snapshot: {}", entry.identity);
                continue;
            }
            index.insert(entry.identity.clone(), position);
        }

        Self {
            generation,
            entries,
            index,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn position(&self, identity: &Identity) -> Option<usize> {
        self.index.get(identity).copied()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.index.contains_key(identity)
    }

    pub fn identities(&self) -> HashSet<Identity> {
        self.index.keys().cloned().collect()
    }
}

// ============================================================================
// EVENTS - What changed, for re-render
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListEvent {
    /// The whole list changed. `deselected` stale selections were dropped.
    Replaced {
        generation: u64,
        count: usize,
        deselected: usize,
    },
    SelectionChanged {
        identity: Identity,
        selected: bool,
    },
    AllSelected {
        count: usize,
    },
    SelectionCleared,
}

// ============================================================================
// LIST CONTROLLER
// ============================================================================

struct ListState {
    snapshot: Arc<ListSnapshot>,
    selection: SelectionTracker,
}

pub struct ListController {
    state: RwLock<ListState>,
    next_generation: AtomicU64,
    observers: Mutex<Vec<Sender<ListEvent>>>,
}

impl ListController {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ListState {
                snapshot: Arc::new(ListSnapshot::default()),
                selection: SelectionTracker::new(),
            }),
            next_generation: AtomicU64::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Install a new listing and drop selections that no longer exist.
    ///
    /// Callable from any thread. Returns the generation of the installed
    /// snapshot, or `None` if a newer one was installed concurrently.
    pub fn replace(&self, entries: Vec<Entry>) -> Option<u64> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.install(ListSnapshot::build(generation, entries))
    }

    fn install(&self, snapshot: ListSnapshot) -> Option<u64> {
        let generation = snapshot.generation();
        let snapshot = Arc::new(snapshot);
        let valid = snapshot.identities();
        let count = snapshot.len();

        let deselected = {
            let mut state = self.state.write();
            if state.snapshot.generation() > generation {
                tracing::debug!(
                    "Discarding snapshot {} superseded by {}",
                    generation,
                    state.snapshot.generation()
                );
                return None;
            }
            state.snapshot = snapshot;
            state.selection.reconcile(&valid)
        };

        tracing::debug!(
            "Snapshot {} installed: {} entries, {} deselected",
            generation,
            count,
            deselected
        );
        self.emit(ListEvent::Replaced {
            generation,
            count,
            deselected,
        });
        Some(generation)
    }

    /// The current snapshot, for consistent multi-row reads.
    pub fn snapshot(&self) -> Arc<ListSnapshot> {
        self.state.read().snapshot.clone()
    }

    pub fn count(&self) -> usize {
        self.state.read().snapshot.len()
    }

    pub fn get(&self, index: usize) -> Result<Entry, ListError> {
        let state = self.state.read();
        state
            .snapshot
            .get(index)
            .cloned()
            .ok_or_else(|| out_of_range(index, state.snapshot.len()))
    }

    /// Stable row key for incremental diffing.
    pub fn identity_of(&self, index: usize) -> Result<Identity, ListError> {
        let state = self.state.read();
        state
            .snapshot
            .get(index)
            .map(|entry| entry.identity.clone())
            .ok_or_else(|| out_of_range(index, state.snapshot.len()))
    }

    pub fn position(&self, identity: &Identity) -> Option<usize> {
        self.state.read().snapshot.position(identity)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.state.read().snapshot.contains(identity)
    }

    /// Flip selection for an identity of the current snapshot. Identities
    /// that are not listed are never selected.
    pub fn toggle(&self, identity: &Identity) -> bool {
        let selected = {
            let mut state = self.state.write();
            if !state.snapshot.contains(identity) {
                tracing::warn!("Ignoring selection toggle for unlisted {}", identity);
                return false;
            }
            state.selection.toggle(identity)
        };

        self.emit(ListEvent::SelectionChanged {
            identity: identity.clone(),
            selected,
        });
        selected
    }

    pub fn is_selected(&self, identity: &Identity) -> bool {
        self.state.read().selection.is_selected(identity)
    }

    pub fn selected_count(&self) -> usize {
        self.state.read().selection.selected_count()
    }

    pub fn clear_selection(&self) {
        let had_selection = {
            let mut state = self.state.write();
            let had_selection = !state.selection.is_empty();
            state.selection.clear();
            had_selection
        };

        if had_selection {
            self.emit(ListEvent::SelectionCleared);
        }
    }

    pub fn select_all(&self) -> usize {
        let count = {
            let mut state = self.state.write();
            let snapshot = state.snapshot.clone();
            for entry in snapshot.entries() {
                state.selection.select(&entry.identity);
            }
            state.selection.selected_count()
        };

        self.emit(ListEvent::AllSelected { count });
        count
    }

    /// Selected entries in list order.
    pub fn selected_entries(&self) -> Vec<Entry> {
        let state = self.state.read();
        state
            .snapshot
            .entries()
            .iter()
            .filter(|entry| state.selection.is_selected(&entry.identity))
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> Receiver<ListEvent> {
        let (tx, rx) = unbounded();
        self.observers.lock().push(tx);
        rx
    }

    fn emit(&self, event: ListEvent) {
        self.observers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for ListController {
    fn default() -> Self {
        Self::new()
    }
}

fn out_of_range(index: usize, count: usize) -> ListError {
    tracing::error!("Row {} requested from a list of {}", index, count);
    ListError::OutOfRange { index, count }
}
