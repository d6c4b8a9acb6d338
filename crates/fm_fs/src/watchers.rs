//! Directory Watchers
//!
//! Watches the listed directory and asks for a reload when its contents
//! change underneath us. Bursts of events are coalesced into one callback.

use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(150);

/// Keeps the watch alive. Dropping it stops the watch and ends the thread.
pub struct DirectoryWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Start watching `dir` (non-recursively). `on_change` runs on the watcher
/// thread.
pub fn watch_directory<F>(dir: &Path, on_change: F) -> Result<DirectoryWatcher>
where
    F: Fn() + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Event>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    let watched = dir.to_path_buf();
    std::thread::Builder::new()
        .name("FM Watcher".to_string())
        .spawn(move || {
            while let Ok(event) = rx.recv() {
                if !is_listing_change(&event.kind) {
                    continue;
                }
                // Drain the rest of the burst
                loop {
                    match rx.recv_timeout(DEBOUNCE) {
                        Ok(_) => continue,
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                tracing::debug!("Directory changed: {:?}", watched);
                on_change();
            }
        })?;

    Ok(DirectoryWatcher {
        path: dir.to_path_buf(),
        _watcher: watcher,
    })
}

fn is_listing_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_))
}
