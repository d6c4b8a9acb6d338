//! Loader seam
//!
//! The list controller never reads directories itself. A `Loader` produces
//! snapshots and is called back after mutations and on navigation.

use anyhow::Result;
use fm_fs::{watch_directory, DirectoryLister, DirectoryWatcher, Identity};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::list::ListController;
use crate::worker::WorkerPool;

pub trait Loader: Send + Sync {
    /// Produce a fresh snapshot of the current location.
    fn reload(&self);

    /// Navigate into a directory row.
    fn load_children(&self, identity: &Identity);
}

/// Native loader: lists a directory on its own worker and installs the result
/// into a `ListController`.
pub struct DirectoryLoader {
    this: Weak<DirectoryLoader>,
    list: Arc<ListController>,
    lister: Arc<DirectoryLister>,
    current: RwLock<PathBuf>,
    sequence: Arc<AtomicU64>,
    pool: WorkerPool,
    watch: bool,
    watcher: Mutex<Option<DirectoryWatcher>>,
}

impl DirectoryLoader {
    pub fn new(
        list: Arc<ListController>,
        lister: DirectoryLister,
        start: PathBuf,
        watch: bool,
    ) -> Result<Arc<Self>> {
        let pool = WorkerPool::new("fm-loader", 1)?;
        let loader = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            list,
            lister: Arc::new(lister),
            current: RwLock::new(start.clone()),
            sequence: Arc::new(AtomicU64::new(0)),
            pool,
            watch,
            watcher: Mutex::new(None),
        });
        loader.rewatch(&start);
        Ok(loader)
    }

    pub fn current_dir(&self) -> PathBuf {
        self.current.read().clone()
    }

    /// Switch to `dir` and load it in the background.
    pub fn navigate(&self, dir: PathBuf) {
        tracing::debug!("Navigating to {:?}", dir);
        *self.current.write() = dir.clone();
        self.rewatch(&dir);
        self.schedule(dir);
    }

    /// List the current directory on the calling thread.
    pub fn load_now(&self) -> Result<usize> {
        let dir = self.current_dir();
        self.sequence.fetch_add(1, Ordering::SeqCst);
        let entries = self.lister.list(&dir)?;
        let count = entries.len();
        self.list.replace(entries);
        Ok(count)
    }

    fn schedule(&self, dir: PathBuf) {
        let ticket = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let sequence = self.sequence.clone();
        let list = self.list.clone();
        let lister = self.lister.clone();

        let queued = self.pool.execute(move || {
            // A newer load was requested while this one waited
            if sequence.load(Ordering::SeqCst) != ticket {
                tracing::debug!("Skipping outdated load of {:?}", dir);
                return;
            }
            match lister.list(&dir) {
                Ok(entries) if sequence.load(Ordering::SeqCst) == ticket => {
                    list.replace(entries);
                }
                Ok(_) => tracing::debug!("Dropping outdated listing of {:?}", dir),
                Err(e) => tracing::error!("Failed to load {:?}: {:#}", dir, e),
            }
        });

        if let Err(e) = queued {
            tracing::error!("Could not schedule load of {:?}: {}", self.current_dir(), e);
        }
    }

    fn rewatch(&self, dir: &Path) {
        if !self.watch {
            return;
        }

        let this = self.this.clone();
        let watcher = watch_directory(dir, move || {
            if let Some(loader) = this.upgrade() {
                loader.reload();
            }
        });

        match watcher {
            Ok(watcher) => *self.watcher.lock() = Some(watcher),
            Err(e) => {
                tracing::warn!("Not watching {:?}: {:#}", dir, e);
                *self.watcher.lock() = None;
            }
        }
    }
}

impl Loader for DirectoryLoader {
    fn reload(&self) {
        self.schedule(self.current_dir());
    }

    fn load_children(&self, identity: &Identity) {
        self.navigate(identity.as_path().to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::ListEvent;
    use fm_fs::{ListOptions, NativeCapabilities};
    use std::time::Duration;
    use tempfile::TempDir;

    fn loader_for(dir: &Path, list: Arc<ListController>) -> Arc<DirectoryLoader> {
        watching_loader_for(dir, list, false)
    }

    fn watching_loader_for(
        dir: &Path,
        list: Arc<ListController>,
        watch: bool,
    ) -> Arc<DirectoryLoader> {
        let lister = DirectoryLister::new(ListOptions::default(), Arc::new(NativeCapabilities));
        DirectoryLoader::new(list, lister, dir.to_path_buf(), watch).unwrap()
    }

    fn wait_for_replace(events: &crossbeam_channel::Receiver<ListEvent>) -> usize {
        loop {
            match events.recv_timeout(Duration::from_secs(5)).unwrap() {
                ListEvent::Replaced { count, .. } => return count,
                _ => continue,
            }
        }
    }

    #[test]
    fn test_reload_installs_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "").unwrap();
        std::fs::write(temp_dir.path().join("b.txt"), "").unwrap();

        let list = Arc::new(ListController::new());
        let events = list.subscribe();
        let loader = loader_for(temp_dir.path(), list.clone());

        loader.reload();
        assert_eq!(wait_for_replace(&events), 2);
        assert_eq!(list.get(0).unwrap().display_name, "a.txt");
    }

    #[test]
    fn test_load_children_navigates() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("inner.txt"), "").unwrap();

        let list = Arc::new(ListController::new());
        let loader = loader_for(temp_dir.path(), list.clone());
        assert_eq!(loader.load_now().unwrap(), 1);

        let events = list.subscribe();
        let sub_identity = list.identity_of(0).unwrap();
        loader.load_children(&sub_identity);

        assert_eq!(wait_for_replace(&events), 1);
        assert_eq!(list.get(0).unwrap().display_name, "inner.txt");
        assert_eq!(loader.current_dir(), sub_identity.as_path());
    }

    #[test]
    fn test_outdated_load_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        std::fs::create_dir(&first).unwrap();
        std::fs::create_dir(&second).unwrap();
        std::fs::write(first.join("one.txt"), "").unwrap();
        std::fs::write(second.join("two.txt"), "").unwrap();
        std::fs::write(second.join("three.txt"), "").unwrap();

        let list = Arc::new(ListController::new());
        let events = list.subscribe();
        let loader = loader_for(temp_dir.path(), list.clone());

        // Hold the single loader thread so both loads queue up behind it
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        loader
            .pool
            .execute(move || {
                let _ = release_rx.recv();
            })
            .unwrap();

        loader.navigate(first);
        loader.navigate(second.clone());
        release_tx.send(()).unwrap();

        assert_eq!(wait_for_replace(&events), 2);
        assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(list.snapshot().generation(), 1);
        assert_eq!(loader.current_dir(), second);
    }

    #[test]
    fn test_watched_directory_reloads_on_change() {
        let temp_dir = TempDir::new().unwrap();
        let list = Arc::new(ListController::new());
        let loader = watching_loader_for(temp_dir.path(), list.clone(), true);
        assert_eq!(loader.load_now().unwrap(), 0);

        let events = list.subscribe();
        std::fs::write(temp_dir.path().join("new.txt"), "hello").unwrap();

        // A write can arrive as several bursts; wait until the new file shows up
        while wait_for_replace(&events) != 1 {}
        assert_eq!(list.get(0).unwrap().display_name, "new.txt");
    }
}
