//! Which files an in-flight indexing job may produce records for.
//!
//! One translation unit can pull in many headers. Only the job that claims a
//! file first produces its record; concurrent jobs skip it. Claims last until
//! the job's delta has been applied, then [`OwnedFiles`] releases them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

/// Set of files currently being indexed.
#[derive(Debug, Default)]
pub struct FileOwnership {
    owned: Mutex<HashSet<PathBuf>>,
}

impl FileOwnership {
    /// An empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.owned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `path`. Returns `false` if another job already holds it. Never blocks
    /// on other jobs.
    #[must_use]
    pub fn try_own(&self, path: &Path) -> bool {
        let claimed = self.lock().insert(path.to_path_buf());
        if !claimed {
            trace!(file = %path.display(), "File already owned by another job");
        }
        claimed
    }

    /// Give up a claim. Releasing an unclaimed path is a no-op.
    pub fn release(&self, path: &Path) {
        self.lock().remove(path);
    }

    /// Whether `path` is currently claimed.
    #[must_use]
    pub fn is_owned(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    /// Number of claimed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Claims held by one job. Released on drop.
#[derive(Debug)]
pub struct OwnedFiles {
    tracker: Arc<FileOwnership>,
    paths: Vec<PathBuf>,
}

impl OwnedFiles {
    /// An empty claim set against `tracker`.
    #[must_use]
    pub fn new(tracker: Arc<FileOwnership>) -> Self {
        Self {
            tracker,
            paths: Vec::new(),
        }
    }

    /// Claim `path` for this job. Returns `true` if this job now holds it,
    /// including when it already did.
    pub fn try_own(&mut self, path: &Path) -> bool {
        if self.holds(path) {
            return true;
        }
        if self.tracker.try_own(path) {
            self.paths.push(path.to_path_buf());
            true
        } else {
            false
        }
    }

    /// Whether this job holds `path`.
    #[must_use]
    pub fn holds(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Paths held by this job.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for OwnedFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            self.tracker.release(path);
        }
    }
}
