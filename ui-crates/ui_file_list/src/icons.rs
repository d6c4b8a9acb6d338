//! Icon Resolution
//!
//! Icons are resolved on workers and cached per identity. A cached tag is
//! only valid for the fingerprint it was resolved against, so a modified file
//! gets a fresh icon.

use crossbeam_channel::Sender;
use dashmap::DashMap;
use fm_fs::{Entry, EntryKind, Identity};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::FileListError;
use crate::types::WorkerMessage;
use crate::worker::WorkerPool;

const DEX_EXTENSIONS: [&str; 2] = ["dex", "jar"];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IconTag(Arc<str>);

impl IconTag {
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IconTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces an icon tag for an entry. Blocking; only ever called on a worker.
pub trait IconResolver: Send + Sync {
    fn resolve(&self, entry: &Entry) -> anyhow::Result<IconTag>;
}

/// Resolves by kind and extension family.
#[derive(Clone, Copy, Debug, Default)]
pub struct KindIconResolver;

impl IconResolver for KindIconResolver {
    fn resolve(&self, entry: &Entry) -> anyhow::Result<IconTag> {
        if entry.kind == EntryKind::Directory {
            return Ok(IconTag::new("folder"));
        }

        let tag = match entry.extension().as_deref() {
            Some(ext) if DEX_EXTENSIONS.contains(&ext) => "dex",
            Some("png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg" | "webp") => "image",
            Some("wav" | "mp3" | "ogg" | "flac" | "m4a") => "audio",
            Some("mp4" | "webm" | "avi" | "mkv") => "video",
            Some("zip" | "tar" | "gz" | "7z" | "rar" | "apk") => "archive",
            Some("txt" | "md" | "pdf" | "doc" | "docx" | "odt") => "document",
            Some(
                "rs" | "c" | "cpp" | "h" | "py" | "js" | "ts" | "java" | "kt" | "json" | "toml"
                | "xml" | "yaml" | "yml",
            ) => "code",
            _ => "file",
        };
        Ok(IconTag::new(tag))
    }
}

// ============================================================================
// CACHE
// ============================================================================

#[derive(Default)]
pub struct IconCache {
    tags: DashMap<Identity, (u64, IconTag)>,
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached tag for the entry's current fingerprint. A stale tag is evicted.
    pub fn get(&self, entry: &Entry) -> Option<IconTag> {
        let fingerprint = entry.fingerprint();
        let cached = self.tags.get(&entry.identity).map(|slot| slot.value().clone())?;
        if cached.0 == fingerprint {
            Some(cached.1)
        } else {
            self.tags.remove(&entry.identity);
            None
        }
    }

    pub fn insert(&self, identity: Identity, fingerprint: u64, tag: IconTag) {
        self.tags.insert(identity, (fingerprint, tag));
    }

    /// Forget identities that are no longer listed.
    pub fn retain(&self, keep: impl Fn(&Identity) -> bool) {
        self.tags.retain(|identity, _| keep(identity));
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IconRequest {
    /// Served from cache
    Ready(IconTag),
    /// Resolution queued or already in flight; the result arrives via poll
    Pending,
}

pub struct IconDispatcher {
    resolver: Arc<dyn IconResolver>,
    cache: IconCache,
    in_flight: DashMap<Identity, u64>,
}

impl IconDispatcher {
    pub fn new(resolver: Arc<dyn IconResolver>) -> Self {
        Self {
            resolver,
            cache: IconCache::new(),
            in_flight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &IconCache {
        &self.cache
    }

    /// Ask for the icon of `entry`. Fire-and-forget: the worker owns a copy of
    /// the entry and reports back on `results`.
    pub fn request(
        &self,
        entry: &Entry,
        pool: &WorkerPool,
        results: &Sender<WorkerMessage>,
    ) -> Result<IconRequest, FileListError> {
        if let Some(tag) = self.cache.get(entry) {
            return Ok(IconRequest::Ready(tag));
        }

        let fingerprint = entry.fingerprint();
        if self.in_flight.get(&entry.identity).map(|f| *f == fingerprint).unwrap_or(false) {
            return Ok(IconRequest::Pending);
        }
        self.in_flight.insert(entry.identity.clone(), fingerprint);

        let resolver = self.resolver.clone();
        let owned = entry.clone();
        let results = results.clone();
        let queued = pool.execute(move || {
            // A panicking resolver still reports, so the row is not left in flight
            let result = match catch_unwind(AssertUnwindSafe(|| resolver.resolve(&owned))) {
                Ok(resolved) => resolved.map_err(|e| format!("{e:#}")),
                Err(_) => Err(format!("icon resolver panicked for {}", owned.identity)),
            };
            let _ = results.send(WorkerMessage::IconResolved {
                identity: owned.identity.clone(),
                fingerprint,
                result,
            });
        });

        if let Err(e) = queued {
            self.in_flight.remove(&entry.identity);
            return Err(e);
        }
        Ok(IconRequest::Pending)
    }

    /// Record a finished resolution. `listed` is the entry currently listed
    /// under that identity, if any. Returns the tag when it should be shown;
    /// results for rows that are gone or changed are dropped.
    pub fn complete(
        &self,
        identity: &Identity,
        fingerprint: u64,
        result: Result<IconTag, String>,
        listed: Option<&Entry>,
    ) -> Option<IconTag> {
        self.in_flight.remove_if(identity, |_, pending| *pending == fingerprint);

        if listed.map(|entry| entry.fingerprint()) != Some(fingerprint) {
            tracing::trace!("Discarding late icon for {}", identity);
            return None;
        }

        match result {
            Ok(tag) => {
                self.cache.insert(identity.clone(), fingerprint, tag.clone());
                Some(tag)
            }
            Err(e) => {
                tracing::debug!("Icon resolution failed for {}: {}", identity, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn file(name: &str) -> Entry {
        let path = PathBuf::from(format!("/data/{name}"));
        Entry::new(Identity::new(path.to_string_lossy().into_owned()), path, name, EntryKind::File)
    }

    #[test]
    fn test_kind_resolver() {
        let resolver = KindIconResolver;
        let folder =
            Entry::new(Identity::new("/d"), PathBuf::from("/d"), "d", EntryKind::Directory);
        assert_eq!(resolver.resolve(&folder).unwrap().as_str(), "folder");
        assert_eq!(resolver.resolve(&file("classes.dex")).unwrap().as_str(), "dex");
        assert_eq!(resolver.resolve(&file("lib.JAR")).unwrap().as_str(), "dex");
        assert_eq!(resolver.resolve(&file("photo.jpeg")).unwrap().as_str(), "image");
        assert_eq!(resolver.resolve(&file("Makefile")).unwrap().as_str(), "file");
    }

    #[test]
    fn test_cache_invalidates_on_fingerprint_change() {
        let cache = IconCache::new();
        let entry = file("a.txt").with_size(1);
        cache.insert(entry.identity.clone(), entry.fingerprint(), IconTag::new("document"));
        assert_eq!(cache.get(&entry), Some(IconTag::new("document")));

        let modified = entry.clone().with_size(2);
        assert_eq!(cache.get(&modified), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_request_resolves_on_worker_then_hits_cache() {
        let pool = WorkerPool::new("test-icons", 1).unwrap();
        let dispatcher = IconDispatcher::new(Arc::new(KindIconResolver));
        let (tx, rx) = unbounded();
        let entry = file("song.mp3");

        assert_eq!(dispatcher.request(&entry, &pool, &tx).unwrap(), IconRequest::Pending);
        // Second request while in flight does not queue again
        assert_eq!(dispatcher.request(&entry, &pool, &tx).unwrap(), IconRequest::Pending);

        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let WorkerMessage::IconResolved { identity, fingerprint, result } = message else {
            panic!("unexpected message");
        };
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        let shown = dispatcher.complete(&identity, fingerprint, result, Some(&entry));
        assert_eq!(shown, Some(IconTag::new("audio")));
        assert_eq!(
            dispatcher.request(&entry, &pool, &tx).unwrap(),
            IconRequest::Ready(IconTag::new("audio"))
        );
    }

    struct PanicsOnce {
        calls: AtomicUsize,
    }

    impl IconResolver for PanicsOnce {
        fn resolve(&self, _entry: &Entry) -> anyhow::Result<IconTag> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("resolver blew up");
            }
            Ok(IconTag::new("file"))
        }
    }

    #[test]
    fn test_panicking_resolver_does_not_block_the_row() {
        let pool = WorkerPool::new("test-icons", 1).unwrap();
        let resolver = Arc::new(PanicsOnce {
            calls: AtomicUsize::new(0),
        });
        let dispatcher = IconDispatcher::new(resolver.clone());
        let (tx, rx) = unbounded();
        let entry = file("broken.bin");

        assert_eq!(dispatcher.request(&entry, &pool, &tx).unwrap(), IconRequest::Pending);
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let WorkerMessage::IconResolved { identity, fingerprint, result } = message else {
            panic!("unexpected message");
        };
        assert!(result.is_err());
        assert_eq!(dispatcher.complete(&identity, fingerprint, result, Some(&entry)), None);

        // The failed resolution released the row, so asking again queues again
        assert_eq!(dispatcher.request(&entry, &pool, &tx).unwrap(), IconRequest::Pending);
        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let WorkerMessage::IconResolved { identity, fingerprint, result } = message else {
            panic!("unexpected message");
        };
        assert_eq!(
            dispatcher.complete(&identity, fingerprint, result, Some(&entry)),
            Some(IconTag::new("file"))
        );
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_late_result_for_unlisted_row_is_dropped() {
        let dispatcher = IconDispatcher::new(Arc::new(KindIconResolver));
        let entry = file("a.png");

        let image = || Ok::<_, String>(IconTag::new("image"));
        let shown = dispatcher.complete(&entry.identity, entry.fingerprint(), image(), None);
        assert_eq!(shown, None);
        assert!(dispatcher.cache().is_empty());

        // Listed, but the file changed since the request went out
        let changed = entry.clone().with_size(10);
        let shown =
            dispatcher.complete(&entry.identity, entry.fingerprint(), image(), Some(&changed));
        assert_eq!(shown, None);
    }
}
