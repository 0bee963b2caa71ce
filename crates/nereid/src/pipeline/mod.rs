//! The indexing pipeline.
//!
//! A pool of worker threads turns requests into file deltas; one merge thread
//! applies them. Only the merge thread ever takes the database write lock.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            Coordinator                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Producers          │  Worker Threads (N)       │  Merge Thread      │
//! │  ─────────          │  ──────────────────       │  ────────────      │
//! │  enqueue()          │  recv(), interactive      │  recv() a job,     │
//! │  coalesce per path  │  queue first              │  drain up to batch │
//! │  block when full ───┼→ freshness check          │  rebase + apply    │
//! │                     │  cache replay or engine   │  (write lock)      │
//! │                     │  own, remap, diff ────────┼→ save to cache     │
//! │                     │  (read lock)              │  release, finish   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one job per request path is queued or running. A request for a
//! path that is already queued upgrades its priority; one for a path that is
//! already running marks the job for a rerun once it finishes.

mod coordinator;
mod merge;
mod request;
mod status;
mod worker;

pub use coordinator::Coordinator;
pub use request::{Enqueued, IndexRequest, JobState};
pub use status::PipelineStats;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crossbeam_channel::Sender;
use tracing::trace;

use crate::db::SymbolDatabase;
use crate::extract::{ExtractionEngine, UnsavedBuffers};
use crate::ownership::FileOwnership;
use crate::project::ProjectConfig;
use crate::snapshot_cache::SnapshotCache;
use crate::timestamp::TimestampCache;
use status::PipelineStatus;

/// Settings fixed for the pipeline's lifetime.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Settings {
    pub(crate) enable_cache_read: bool,
    pub(crate) enable_cache_write: bool,
    pub(crate) merge_batch_size: usize,
}

/// Bookkeeping for one accepted request path.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InFlight {
    pub(crate) state: JobState,
    pub(crate) interactive: bool,
    /// A request arrived while the job was running
    pub(crate) rerun: bool,
    pub(crate) rerun_interactive: bool,
}

/// Accepted work that has not finished yet.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    pub(crate) jobs: HashMap<PathBuf, InFlight>,
    pub(crate) removals: usize,
}

impl Tracker {
    pub(crate) fn is_idle(&self) -> bool {
        self.jobs.is_empty() && self.removals == 0
    }
}

/// Senders into the two request queues.
#[derive(Debug, Clone)]
pub(crate) struct Queues {
    pub(crate) interactive: Sender<PathBuf>,
    pub(crate) background: Sender<PathBuf>,
}

impl Queues {
    pub(crate) fn for_priority(&self, interactive: bool) -> &Sender<PathBuf> {
        if interactive { &self.interactive } else { &self.background }
    }
}

/// State shared by the coordinator and every pipeline thread.
pub(crate) struct Shared {
    pub(crate) db: Arc<RwLock<SymbolDatabase>>,
    pub(crate) engine: Arc<dyn ExtractionEngine>,
    pub(crate) project: Arc<dyn ProjectConfig>,
    pub(crate) snapshots: SnapshotCache,
    pub(crate) timestamps: TimestampCache,
    pub(crate) ownership: Arc<FileOwnership>,
    pub(crate) unsaved: Mutex<UnsavedBuffers>,
    pub(crate) status: PipelineStatus,
    pub(crate) settings: Settings,
    pub(crate) tracker: Mutex<Tracker>,
    pub(crate) idle: Condvar,
    /// `None` once shutdown has begun
    pub(crate) queues: Mutex<Option<Queues>>,
}

impl Shared {
    pub(crate) fn read_db(&self) -> RwLockReadGuard<'_, SymbolDatabase> {
        self.db.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_db(&self) -> RwLockWriteGuard<'_, SymbolDatabase> {
        self.db.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn tracker(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn queues(&self) -> Option<Queues> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn unsaved(&self) -> UnsavedBuffers {
        self.unsaved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_state(&self, path: &Path, state: JobState) {
        if let Some(job) = self.tracker().jobs.get_mut(path) {
            trace!(file = %path.display(), from = %job.state, to = %state, "Job state");
            job.state = state;
        }
    }
}
