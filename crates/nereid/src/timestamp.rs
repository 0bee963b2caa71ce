//! In-memory cache of file modification times.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::path::{Timestamp, last_modified};

/// Path to last known modification time.
///
/// The lock is held only for the map lookup or insert, never across a stat.
#[derive(Debug, Default)]
pub struct TimestampCache {
    times: Mutex<HashMap<PathBuf, Timestamp>>,
}

impl TimestampCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Timestamp>> {
        self.times.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached time for `path`, without touching the filesystem.
    #[must_use]
    pub fn get_cached(&self, path: &Path) -> Option<Timestamp> {
        self.lock().get(path).copied()
    }

    /// Record `time` for `path`.
    pub fn update(&self, path: &Path, time: Timestamp) {
        self.lock().insert(path.to_path_buf(), time);
    }

    /// Forget `path`.
    pub fn invalidate(&self, path: &Path) {
        self.lock().remove(path);
    }

    /// The cached time, or a fresh stat that is then cached.
    ///
    /// Two threads missing on the same path may both stat it; the later
    /// update wins.
    #[must_use]
    pub fn get_or_stat(&self, path: &Path) -> Option<Timestamp> {
        if let Some(time) = self.get_cached(path) {
            return Some(time);
        }
        let time = last_modified(path)?;
        self.update(path, time);
        Some(time)
    }
}
