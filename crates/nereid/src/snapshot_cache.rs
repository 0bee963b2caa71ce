//! Recently loaded cache entries, in front of the on-disk store.
//!
//! Freshness checks for a burst of translation units tend to load the same
//! shared headers over and over. Entries decoded once are kept in an LRU and
//! handed out as `Arc`s.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nereid_cache::{CacheEntry, CacheStore, SchemaVersion};
use tracing::trace;

use crate::lru::LruCache;
use crate::snapshot::RemappedSnapshot;

/// Envelope version for persisted [`RemappedSnapshot`]s. Bump the major
/// version whenever the snapshot layout changes incompatibly.
pub const SNAPSHOT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0);

/// A decoded cache entry.
pub type CachedSnapshot = CacheEntry<RemappedSnapshot>;

/// LRU of decoded snapshots over a [`CacheStore`].
#[derive(Debug)]
pub struct SnapshotCache {
    store: CacheStore,
    loaded: Mutex<LruCache<PathBuf, Arc<CachedSnapshot>>>,
}

impl SnapshotCache {
    /// Wrap `store`, retaining up to `capacity` decoded entries.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(store: CacheStore, capacity: usize) -> Self {
        Self {
            store,
            loaded: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<PathBuf, Arc<CachedSnapshot>>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// The entry for `path`, from memory or disk. Disk reads happen without
    /// the lock held.
    #[must_use]
    pub fn try_load(&self, path: &Path) -> Option<Arc<CachedSnapshot>> {
        let key = path.to_path_buf();
        if let Some(entry) = self.lock().get(&key) {
            return Some(Arc::clone(entry));
        }
        let entry = Arc::new(self.store.load::<RemappedSnapshot>(path)?);
        trace!(file = %path.display(), "Loaded snapshot from disk");
        Some(self.retain_newer(key, entry))
    }

    /// Keep whichever of `entry` and the resident copy records the later
    /// modification time, and return it.
    fn retain_newer(&self, key: PathBuf, entry: Arc<CachedSnapshot>) -> Arc<CachedSnapshot> {
        let mut loaded = self.lock();
        if let Some(resident) = loaded.get(&key)
            && resident.last_modified >= entry.last_modified
        {
            return Arc::clone(resident);
        }
        loaded.insert(key, Arc::clone(&entry));
        entry
    }

    /// Remove the entry from memory if present, else read it from disk
    /// without retaining it.
    #[must_use]
    pub fn take_or_load(&self, path: &Path) -> Option<Arc<CachedSnapshot>> {
        if let Some(entry) = self.lock().take(&path.to_path_buf()) {
            return Some(entry);
        }
        self.store.load::<RemappedSnapshot>(path).map(Arc::new)
    }

    /// Persist `entry` and keep it in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot write the slot. The in-memory copy
    /// is dropped in that case so memory never runs ahead of disk.
    pub fn save(&self, path: &Path, entry: Arc<CachedSnapshot>) -> nereid_cache::Result<()> {
        match self.store.save(path, &*entry) {
            Ok(()) => {
                self.lock().insert(path.to_path_buf(), entry);
                Ok(())
            }
            Err(e) => {
                self.invalidate(path);
                Err(e)
            }
        }
    }

    /// Forget the in-memory copy of `path`.
    pub fn invalidate(&self, path: &Path) {
        let _ = self.lock().take(&path.to_path_buf());
    }

    /// Remove `path` from memory and disk.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing slot file cannot be deleted.
    pub fn remove(&self, path: &Path) -> nereid_cache::Result<()> {
        self.invalidate(path);
        self.store.remove(path)
    }
}
