//! File List Controller
//!
//! The primary-context façade a presentation adapter talks to. It reads rows
//! from the `ListController`, asks the `ActionGate` before anything happens,
//! pushes blocking work onto workers and turns their results into
//! `FileListUpdate`s.

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use fm_fs::{CapabilityProvider, Entry, FileOperations, Identity, OpError};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use crate::error::FileListError;
use crate::gate::{ActionGate, FileAction, GateMode, PermittedActions};
use crate::icons::{IconDispatcher, IconRequest, IconResolver, IconTag, KindIconResolver};
use crate::list::{ListController, ListEvent};
use crate::loader::Loader;
use crate::settings::FileListSettings;
use crate::types::*;
use crate::worker::WorkerPool;

pub struct FileListController {
    list: Arc<ListController>,
    list_events: Receiver<ListEvent>,
    mode: GateMode,
    capabilities: Arc<dyn CapabilityProvider>,
    operations: Arc<FileOperations>,
    icons: IconDispatcher,
    loader: Arc<dyn Loader>,
    pool: WorkerPool,
    results_tx: Sender<WorkerMessage>,
    results_rx: Receiver<WorkerMessage>,
    clipboard: Option<Clipboard>,
}

impl FileListController {
    pub fn new(
        list: Arc<ListController>,
        loader: Arc<dyn Loader>,
        operations: Arc<FileOperations>,
        capabilities: Arc<dyn CapabilityProvider>,
        settings: &FileListSettings,
    ) -> Result<Self> {
        let (results_tx, results_rx) = unbounded();
        let list_events = list.subscribe();

        Ok(Self {
            list,
            list_events,
            mode: settings.gate_mode(),
            capabilities,
            operations,
            icons: IconDispatcher::new(Arc::new(KindIconResolver)),
            loader,
            pool: WorkerPool::new("fm-worker", settings.worker_threads)?,
            results_tx,
            results_rx,
            clipboard: None,
        })
    }

    pub fn with_icon_resolver(mut self, resolver: Arc<dyn IconResolver>) -> Self {
        self.icons = IconDispatcher::new(resolver);
        self
    }

    pub fn list(&self) -> &Arc<ListController> {
        &self.list
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn count(&self) -> usize {
        self.list.count()
    }

    // ------------------------------------------------------------------------
    // Rows and icons
    // ------------------------------------------------------------------------

    /// Everything needed to draw one row. Actions come from the snapshot's
    /// capability flags; use `permitted_actions` before acting.
    pub fn row(&self, index: usize) -> Result<RowModel, FileListError> {
        let entry = self.list.get(index)?;
        let icon = match self.icons.request(&entry, &self.pool, &self.results_tx)? {
            IconRequest::Ready(tag) => Some(tag),
            IconRequest::Pending => None,
        };

        Ok(RowModel {
            identity: entry.identity.clone(),
            title: entry.display_name.clone(),
            is_directory: entry.is_dir(),
            is_symlink: entry.is_symlink,
            detail: if entry.is_dir() {
                entry.child_count as u64
            } else {
                entry.size_bytes
            },
            modified: entry.last_modified,
            selected: self.list.is_selected(&entry.identity),
            icon,
            actions: ActionGate::permitted(&entry, self.mode),
        })
    }

    /// Request icons for the visible rows. Cached tags are returned right
    /// away, the rest arrive through `poll`.
    pub fn request_icons(
        &self,
        visible: Range<usize>,
    ) -> Result<Vec<(Identity, IconTag)>, FileListError> {
        let snapshot = self.list.snapshot();
        let end = visible.end.min(snapshot.len());
        let mut ready = Vec::new();
        for entry in snapshot.entries().get(visible.start..end).unwrap_or(&[]) {
            let request = self.icons.request(entry, &self.pool, &self.results_tx)?;
            if let IconRequest::Ready(tag) = request {
                ready.push((entry.identity.clone(), tag));
            }
        }
        Ok(ready)
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    pub fn toggle_selection(&self, index: usize) -> Result<bool, FileListError> {
        let identity = self.list.identity_of(index)?;
        Ok(self.list.toggle(&identity))
    }

    pub fn cancel_selection(&self) {
        self.list.clear_selection();
    }

    pub fn select_all(&self) -> usize {
        self.list.select_all()
    }

    pub fn selected_count(&self) -> usize {
        self.list.selected_count()
    }

    // ------------------------------------------------------------------------
    // Gating
    // ------------------------------------------------------------------------

    /// Live permission check for one row.
    pub fn permitted_actions(&self, index: usize) -> Result<PermittedActions, FileListError> {
        let entry = self.list.get(index)?;
        Ok(ActionGate::evaluate(&entry, self.mode, self.capabilities.as_ref()))
    }

    /// Actions permitted for every selected row.
    pub fn selection_actions(&self) -> PermittedActions {
        ActionGate::permitted_for_all(
            &self.list.selected_entries(),
            self.mode,
            self.capabilities.as_ref(),
        )
    }

    /// Check `action` for a row and hand the entry to the presentation layer
    /// (share, shortcut, properties, open-with, copy-path).
    pub fn prepare(&self, action: FileAction, index: usize) -> Result<Entry, FileListError> {
        let entry = self.list.get(index)?;
        self.ensure_permitted(&entry, action)?;
        Ok(entry)
    }

    pub fn copy_path(&self, index: usize) -> Result<String, FileListError> {
        Ok(self.prepare(FileAction::CopyPath, index)?.displayable_path())
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Directories navigate through the loader, files come back for "open with".
    pub fn activate(&self, index: usize) -> Result<Activation, FileListError> {
        let entry = self.prepare(FileAction::Open, index)?;
        if entry.is_dir() {
            self.loader.load_children(&entry.identity);
            Ok(Activation::Navigated(entry.identity))
        } else {
            Ok(Activation::OpenWith(entry))
        }
    }

    /// Queue a rename. The outcome arrives through `poll`.
    pub fn rename(&self, index: usize, new_name: &str) -> Result<(), FileListError> {
        let entry = self.prepare(FileAction::Rename, index)?;
        let new_name = new_name.to_string();
        self.dispatch(entry, FileAction::Rename, move |operations, entry| {
            operations.rename(entry, &new_name).map(OperationDone::Renamed)
        })
    }

    /// Queue a delete the user has confirmed. The outcome arrives through `poll`.
    pub fn delete(
        &self,
        index: usize,
        _confirmation: DeleteConfirmation,
    ) -> Result<(), FileListError> {
        let entry = self.prepare(FileAction::Delete, index)?;
        self.dispatch(entry, FileAction::Delete, |operations, entry| {
            operations.delete(entry).map(|()| OperationDone::Deleted)
        })
    }

    /// Stage the selection for a later paste.
    pub fn stage_clipboard(&mut self, is_cut: bool) -> Result<&Clipboard, FileListError> {
        let action = if is_cut { FileAction::Cut } else { FileAction::Copy };
        let selected = self.list.selected_entries();
        if selected.is_empty() {
            return Err(FileListError::EmptySelection);
        }
        for entry in &selected {
            self.ensure_permitted(entry, action)?;
        }

        tracing::debug!("Staged {} entries ({:?})", selected.len(), action);
        Ok(self.clipboard.insert(Clipboard {
            identities: selected.into_iter().map(|entry| entry.identity).collect(),
            is_cut,
        }))
    }

    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    pub fn take_clipboard(&mut self) -> Option<Clipboard> {
        self.clipboard.take()
    }

    // ------------------------------------------------------------------------
    // Worker results
    // ------------------------------------------------------------------------

    /// Drain finished work without blocking.
    pub fn poll(&self) -> Vec<FileListUpdate> {
        self.prune_icons();
        self.results_rx
            .try_iter()
            .filter_map(|message| self.handle(message))
            .collect()
    }

    /// Block until at least one worker message arrives (or `timeout`), then
    /// drain. Messages that produce no update (late icons) still count.
    pub fn wait_for_update(&self, timeout: Duration) -> Option<Vec<FileListUpdate>> {
        let first = self.results_rx.recv_timeout(timeout).ok()?;
        self.prune_icons();
        let mut updates: Vec<FileListUpdate> = self.handle(first).into_iter().collect();
        updates.extend(self.results_rx.try_iter().filter_map(|message| self.handle(message)));
        Some(updates)
    }

    fn handle(&self, message: WorkerMessage) -> Option<FileListUpdate> {
        match message {
            WorkerMessage::IconResolved {
                identity,
                fingerprint,
                result,
            } => {
                let snapshot = self.list.snapshot();
                let listed = snapshot.position(&identity).and_then(|i| snapshot.get(i));
                self.icons
                    .complete(&identity, fingerprint, result, listed)
                    .map(|tag| FileListUpdate::IconReady { identity, tag })
            }
            WorkerMessage::OperationFinished {
                identity,
                action,
                result: Ok(done),
            } => {
                tracing::info!("{:?} of {} succeeded", action, identity);
                self.loader.reload();
                Some(FileListUpdate::OperationSucceeded { identity, action, done })
            }
            WorkerMessage::OperationFinished {
                identity,
                action,
                result: Err(error),
            } => {
                log_failure(&identity, action, &error);
                Some(FileListUpdate::OperationFailed { identity, action, error })
            }
        }
    }

    fn dispatch<F>(
        &self,
        entry: Entry,
        action: FileAction,
        operation: F,
    ) -> Result<(), FileListError>
    where
        F: FnOnce(&FileOperations, &Entry) -> Result<OperationDone, OpError> + Send + 'static,
    {
        tracing::debug!("Dispatching {:?} of {}", action, entry.identity);
        let operations = self.operations.clone();
        let results = self.results_tx.clone();
        self.pool.execute(move || {
            let result = operation(&operations, &entry);
            let _ = results.send(WorkerMessage::OperationFinished {
                identity: entry.identity.clone(),
                action,
                result,
            });
        })
    }

    fn ensure_permitted(&self, entry: &Entry, action: FileAction) -> Result<(), FileListError> {
        if ActionGate::evaluate(entry, self.mode, self.capabilities.as_ref()).contains(action) {
            return Ok(());
        }
        tracing::warn!("{:?} refused for {}", action, entry.identity);
        Err(FileListError::NotPermitted {
            action,
            identity: entry.identity.clone(),
        })
    }

    /// Forget cached icons of rows that left the listing.
    fn prune_icons(&self) {
        let replaced = self
            .list_events
            .try_iter()
            .any(|event| matches!(event, ListEvent::Replaced { .. }));
        if replaced {
            let snapshot = self.list.snapshot();
            self.icons.cache().retain(|identity| snapshot.contains(identity));
        }
    }
}

fn log_failure(identity: &Identity, action: FileAction, error: &OpError) {
    if error.is_unexpected() {
        tracing::error!("{:?} of {} failed: {}", action, identity, error);
    } else {
        tracing::warn!("{:?} of {} refused: {}", action, identity, error);
    }
}
