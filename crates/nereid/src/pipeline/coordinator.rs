//! Request intake, coalescing and thread lifecycle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded, unbounded};
use nereid_cache::CacheStore;
use tracing::{debug, error, info, trace};

use super::merge::{self, MergeMessage};
use super::status::PipelineStatus;
use super::worker::{self, panic_message};
use super::{Enqueued, InFlight, IndexRequest, JobState, PipelineStats, Queues, Settings, Shared, Tracker};
use crate::config::{Config, PathFilter};
use crate::db::{ApplyStats, SymbolDatabase};
use crate::error::{Error, Result};
use crate::extract::{ExtractionEngine, UnsavedBuffers};
use crate::ownership::FileOwnership;
use crate::path::normalize;
use crate::project::ProjectConfig;
use crate::snapshot_cache::{SNAPSHOT_SCHEMA, SnapshotCache};
use crate::timestamp::TimestampCache;

/// Runs the indexing pipeline and owns the symbol database.
///
/// Queries go through [`Coordinator::read`], which never blocks on workers
/// and only waits while the merge thread applies a batch.
///
/// Dropping the coordinator stops its threads; queued requests that were not
/// yet picked up are still processed first.
pub struct Coordinator {
    shared: Arc<Shared>,
    filter: PathFilter,
    merge: Option<Sender<MergeMessage>>,
    workers: Vec<JoinHandle<()>>,
    merger: Option<JoinHandle<ApplyStats>>,
}

impl Coordinator {
    /// Start a pipeline for the project rooted at `project_root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` does not validate, or
    /// [`Error::Io`] if a thread cannot be spawned.
    pub fn new(
        config: &Config,
        project_root: &Path,
        project: Arc<dyn ProjectConfig>,
        engine: Arc<dyn ExtractionEngine>,
    ) -> Result<Self> {
        config.validate()?;
        let filter = config.path_filter()?;
        let store = CacheStore::new(
            config.cache_dir_for(project_root),
            config.cache_format,
            SNAPSHOT_SCHEMA,
        );

        let (interactive_tx, interactive_rx) = bounded(config.queue_capacity);
        let (background_tx, background_rx) = bounded(config.queue_capacity);
        let (merge_tx, merge_rx) = unbounded();

        let shared = Arc::new(Shared {
            db: Arc::new(RwLock::new(SymbolDatabase::new())),
            engine,
            project,
            snapshots: SnapshotCache::new(store, config.snapshot_cache_capacity),
            timestamps: TimestampCache::new(),
            ownership: Arc::new(FileOwnership::new()),
            unsaved: Mutex::new(UnsavedBuffers::new()),
            status: PipelineStatus::default(),
            settings: Settings {
                enable_cache_read: config.enable_cache_read,
                enable_cache_write: config.enable_cache_write,
                merge_batch_size: config.merge_batch_size,
            },
            tracker: Mutex::new(Tracker::default()),
            idle: std::sync::Condvar::new(),
            queues: Mutex::new(Some(Queues {
                interactive: interactive_tx,
                background: background_tx,
            })),
        });

        let thread_count = config.thread_count();
        let mut coordinator = Self {
            shared: Arc::clone(&shared),
            filter,
            merge: Some(merge_tx.clone()),
            workers: Vec::with_capacity(thread_count),
            merger: None,
        };

        let merge_shared = Arc::clone(&shared);
        coordinator.merger = Some(
            thread::Builder::new()
                .name("nereid-merge".to_string())
                .spawn(move || merge::run(merge_shared, merge_rx))?,
        );

        for index in 0..thread_count {
            let worker_shared = Arc::clone(&shared);
            let interactive = interactive_rx.clone();
            let background = background_rx.clone();
            let merge = merge_tx.clone();
            coordinator.workers.push(
                thread::Builder::new()
                    .name(format!("nereid-index-{index}"))
                    .spawn(move || worker::run(worker_shared, interactive, background, merge))?,
            );
        }

        info!(
            threads = thread_count,
            cache = %shared.snapshots.store().root().display(),
            format = %config.cache_format,
            "Indexing pipeline started"
        );
        Ok(coordinator)
    }

    /// Accept a request.
    ///
    /// Blocks while the target queue is full. A request for a path that is
    /// already queued or running is folded into that job instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the pipeline has shut down.
    pub fn enqueue(&self, request: IndexRequest) -> Result<Enqueued> {
        let path = normalize(&request.path);
        if let Some(pattern) = self.filter.rejection(&path) {
            debug!(file = %path.display(), pattern, "Request filtered");
            self.shared.status.request_filtered();
            return Ok(Enqueued::Filtered);
        }

        let mut tracker = self.shared.tracker();
        if let Some(job) = tracker.jobs.get_mut(&path) {
            let upgrade = match job.state {
                JobState::Queued => {
                    let upgrade = request.interactive && !job.interactive;
                    job.interactive |= request.interactive;
                    upgrade
                }
                _ => {
                    job.rerun = true;
                    job.rerun_interactive |= request.interactive;
                    false
                }
            };
            drop(tracker);
            trace!(file = %path.display(), upgrade, "Coalesced request");
            self.shared.status.request_coalesced();
            if upgrade {
                // The old background entry becomes stale and is discarded.
                self.send(path, true)?;
            }
            return Ok(Enqueued::Coalesced);
        }

        tracker.jobs.insert(
            path.clone(),
            InFlight {
                state: JobState::Queued,
                interactive: request.interactive,
                rerun: false,
                rerun_interactive: false,
            },
        );
        drop(tracker);
        self.shared.status.job_queued();

        if let Err(e) = self.send(path.clone(), request.interactive) {
            self.abandon(&path);
            return Err(e);
        }
        Ok(Enqueued::Accepted)
    }

    fn send(&self, path: PathBuf, interactive: bool) -> Result<()> {
        let queues = self
            .shared
            .queues()
            .ok_or_else(|| Error::Internal("indexing pipeline is shut down".to_string()))?;
        queues
            .for_priority(interactive)
            .send(path)
            .map_err(|_| Error::Internal("all indexing workers have exited".to_string()))
    }

    fn abandon(&self, path: &Path) {
        let mut tracker = self.shared.tracker();
        if tracker.jobs.remove(path).is_some() {
            self.shared.status.job_started();
            self.shared.status.job_merge_queued();
            self.shared
                .status
                .job_failed(crate::error::IndexError::new(
                    path.to_path_buf(),
                    crate::error::IndexErrorKind::Internal,
                    "request could not be queued",
                ));
        }
        if tracker.is_idle() {
            self.shared.idle.notify_all();
        }
    }

    /// Queue every project file in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the pipeline has shut down.
    pub fn index_project(&self) -> Result<usize> {
        let files = self.shared.project.files();
        let mut accepted = 0;
        for file in files {
            if self.enqueue(IndexRequest::new(file))? == Enqueued::Accepted {
                accepted += 1;
            }
        }
        info!(files = accepted, "Queued project files");
        Ok(accepted)
    }

    /// A file changed on disk. Queues it if it is a project file, and every
    /// project file that includes it directly or transitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the pipeline has shut down.
    pub fn notify_changed(&self, path: &Path) -> Result<usize> {
        let path = normalize(path);
        self.shared.timestamps.invalidate(&path);

        let mut targets = Vec::new();
        if self.shared.project.contains(&path) {
            targets.push(path.clone());
        }
        let includers = self.read().dependents(&path);
        targets.extend(
            includers
                .into_iter()
                .filter(|file| self.shared.project.contains(file)),
        );
        debug!(file = %path.display(), targets = targets.len(), "File changed");

        let mut queued = 0;
        for target in targets {
            if self.enqueue(IndexRequest::new(target))? != Enqueued::Filtered {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// A file was deleted or left the project. Retracts its contributions
    /// and its cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the pipeline has shut down.
    pub fn notify_removed(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let merge = self
            .merge
            .as_ref()
            .ok_or_else(|| Error::Internal("indexing pipeline is shut down".to_string()))?;
        self.shared.tracker().removals += 1;
        self.clear_unsaved(&path);
        if merge.send(MergeMessage::RemoveFile(path)).is_err() {
            let mut tracker = self.shared.tracker();
            tracker.removals = tracker.removals.saturating_sub(1);
            return Err(Error::Internal("merge thread has exited".to_string()));
        }
        Ok(())
    }

    /// Record editor contents for `path` that differ from disk. They are
    /// passed to the engine on every extraction until cleared.
    pub fn set_unsaved(&self, path: &Path, text: impl Into<String>) {
        self.shared
            .unsaved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(path), text.into());
    }

    /// Forget unsaved contents for `path`.
    pub fn clear_unsaved(&self, path: &Path) {
        self.shared
            .unsaved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize(path));
    }

    /// Block until every accepted request and removal has finished.
    pub fn wait_idle(&self) {
        let mut tracker = self.shared.tracker();
        while !tracker.is_idle() {
            tracker = self
                .shared
                .idle
                .wait(tracker)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Current pipeline counters.
    #[must_use]
    pub fn status(&self) -> PipelineStats {
        self.shared.status.stats()
    }

    /// State of the job for `path`, if one is queued or running.
    #[must_use]
    pub fn job_state(&self, path: &Path) -> Option<JobState> {
        self.shared.tracker().jobs.get(&normalize(path)).map(|job| job.state)
    }

    /// Read access to the symbol database.
    pub fn read(&self) -> RwLockReadGuard<'_, SymbolDatabase> {
        self.shared.read_db()
    }

    /// The shared database handle.
    #[must_use]
    pub fn database(&self) -> Arc<RwLock<SymbolDatabase>> {
        Arc::clone(&self.shared.db)
    }

    /// Wait for outstanding work, stop every thread and return the final
    /// counters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if a pipeline thread panicked.
    pub fn shutdown(mut self) -> Result<PipelineStats> {
        self.wait_idle();
        self.stop()?;
        Ok(self.status())
    }

    fn stop(&mut self) -> Result<()> {
        // Closing the request queues lets workers drain and exit.
        self.shared
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let mut failure = None;
        for handle in self.workers.drain(..) {
            if let Err(payload) = handle.join() {
                let msg = format!("Indexing worker panicked: {}", panic_message(payload.as_ref()));
                error!(panic_msg = %msg, "Worker thread panicked");
                failure = Some(Error::Internal(msg));
            }
        }

        // Workers are gone, so this was the last merge sender.
        self.merge.take();
        if let Some(handle) = self.merger.take() {
            match handle.join() {
                Ok(totals) => debug!(
                    files_updated = totals.files_updated,
                    files_removed = totals.files_removed,
                    "Indexing pipeline stopped"
                ),
                Err(payload) => {
                    let msg = format!("Merge thread panicked: {}", panic_message(payload.as_ref()));
                    error!(panic_msg = %msg, "Merge thread panicked");
                    failure = Some(Error::Internal(msg));
                }
            }
        }

        failure.map_or(Ok(()), Err)
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "Indexing pipeline did not stop cleanly");
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("workers", &self.workers.len())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
