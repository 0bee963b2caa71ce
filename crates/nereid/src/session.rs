//! Bounded, thread-safe store of expensive per-file contexts.
//!
//! Holds at most `capacity` sessions (parsed translation units, completion
//! contexts, decoded dumps). Handing out `Arc`s lets a caller keep using a
//! session after it has been evicted.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::lru::LruCache;

/// LRU of sessions keyed by file path.
#[derive(Debug)]
pub struct SessionCache<S> {
    sessions: Mutex<LruCache<PathBuf, Arc<S>>>,
}

impl<S> SessionCache<S> {
    /// Create a cache holding at most `capacity` sessions.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<PathBuf, Arc<S>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The session for `path`, promoting it.
    #[must_use]
    pub fn try_get(&self, path: &Path) -> Option<Arc<S>> {
        self.lock().get(&path.to_path_buf()).cloned()
    }

    /// Remove and return the session for `path`.
    #[must_use]
    pub fn take(&self, path: &Path) -> Option<Arc<S>> {
        self.lock().take(&path.to_path_buf())
    }

    /// Store `session` for `path`, evicting the least recently used one if full.
    pub fn insert(&self, path: &Path, session: Arc<S>) {
        if let Some((evicted, _)) = self.lock().insert(path.to_path_buf(), session) {
            debug!(file = %evicted.display(), "Evicted session");
        }
    }

    /// The session for `path`, creating it with `create` on a miss.
    ///
    /// `create` runs without the lock held, so two threads missing on the
    /// same path may both create; the later insert wins.
    pub fn get_or_create(&self, path: &Path, create: impl FnOnce() -> S) -> Arc<S> {
        if let Some(session) = self.try_get(path) {
            return session;
        }
        let session = Arc::new(create());
        self.insert(path, Arc::clone(&session));
        session
    }

    /// Try to create a session on a miss; failures are not cached.
    ///
    /// # Errors
    ///
    /// Returns whatever `create` returns.
    pub fn get_or_try_create<E>(&self, path: &Path, create: impl FnOnce() -> Result<S, E>) -> Result<Arc<S>, E> {
        if let Some(session) = self.try_get(path) {
            return Ok(session);
        }
        let session = Arc::new(create()?);
        self.insert(path, Arc::clone(&session));
        Ok(session)
    }

    /// Number of retained sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no session is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_reuses_existing_session() {
        let cache = SessionCache::new(2);
        let first = cache.get_or_create(Path::new("/a.cc"), || 1);
        let second = cache.get_or_create(Path::new("/a.cc"), || 2);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
    }

    #[test]
    fn capacity_bounds_retained_sessions() {
        let cache = SessionCache::new(2);
        cache.get_or_create(Path::new("/a.cc"), || 1);
        cache.get_or_create(Path::new("/b.cc"), || 2);
        let _ = cache.try_get(Path::new("/a.cc"));
        cache.get_or_create(Path::new("/c.cc"), || 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.try_get(Path::new("/b.cc")).is_none());
        assert!(cache.try_get(Path::new("/a.cc")).is_some());
    }

    #[test]
    fn take_hands_over_session() {
        let cache = SessionCache::new(1);
        cache.get_or_create(Path::new("/a.cc"), || 7);

        assert_eq!(cache.take(Path::new("/a.cc")).as_deref(), Some(&7));
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_creation_is_not_cached() {
        let cache: SessionCache<u32> = SessionCache::new(1);
        let result: Result<_, &str> = cache.get_or_try_create(Path::new("/a.cc"), || Err("boom"));

        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
