//! The merge thread: the only writer of the symbol database.
//!
//! Jobs are drained in batches. Each batch is applied under one write lock;
//! cache saves and bookkeeping happen after the lock is released.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, trace, warn};

use super::{JobState, Shared};
use crate::db::ApplyStats;
use crate::delta::{Delta, FileDelta};
use crate::error::IndexError;
use crate::ownership::OwnedFiles;
use crate::path::Timestamp;
use crate::snapshot::RemappedSnapshot;
use crate::snapshot_cache::CachedSnapshot;

/// One file's contribution from a job.
#[derive(Debug)]
pub(crate) struct FileJob {
    pub(crate) path: PathBuf,
    /// Taken by the merge thread when applied
    pub(crate) delta: Option<FileDelta>,
    /// Database snapshot the delta was computed against
    pub(crate) based_on: Option<Arc<RemappedSnapshot>>,
    /// Entry to persist after applying; `None` for cache replays
    pub(crate) cache_entry: Option<Arc<CachedSnapshot>>,
    /// Disk modification time of the indexed contents; `None` for unsaved buffers
    pub(crate) last_modified: Option<Timestamp>,
}

/// A finished job on its way to the merge thread.
#[derive(Debug)]
pub(crate) struct MergeJob {
    pub(crate) path: PathBuf,
    pub(crate) files: Vec<FileJob>,
    pub(crate) error: Option<IndexError>,
    pub(crate) from_cache: bool,
    /// Claims are released once the job's deltas are applied and saved
    pub(crate) owned: OwnedFiles,
}

impl MergeJob {
    pub(crate) fn applied(path: PathBuf, files: Vec<FileJob>, owned: OwnedFiles, from_cache: bool) -> Self {
        Self {
            path,
            files,
            error: None,
            from_cache,
            owned,
        }
    }

    pub(crate) fn failed(path: PathBuf, error: IndexError, owned: OwnedFiles) -> Self {
        Self {
            path,
            files: Vec::new(),
            error: Some(error),
            from_cache: false,
            owned,
        }
    }
}

/// Work for the merge thread.
#[derive(Debug)]
pub(crate) enum MergeMessage {
    /// Apply a job's deltas
    Job(MergeJob),
    /// Retract everything a file contributed
    RemoveFile(PathBuf),
}

/// Merge loop. Exits once every sender is gone and the queue is drained.
#[allow(clippy::needless_pass_by_value)] // Receiver is consumed by the loop
pub(crate) fn run(shared: Arc<Shared>, receiver: Receiver<MergeMessage>) -> ApplyStats {
    let batch_size = shared.settings.merge_batch_size;
    let mut totals = ApplyStats::default();
    let mut batch = Vec::with_capacity(batch_size);

    while let Ok(first) = receiver.recv() {
        batch.push(first);
        while batch.len() < batch_size {
            match receiver.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }
        totals.accumulate(merge_batch(&shared, &mut batch));
    }

    debug!(
        files_updated = totals.files_updated,
        files_removed = totals.files_removed,
        symbols_created = totals.symbols_created,
        symbols_removed = totals.symbols_removed,
        "Merge thread finished"
    );
    totals
}

fn merge_batch(shared: &Shared, batch: &mut Vec<MergeMessage>) -> ApplyStats {
    trace!(batch_size = batch.len(), "Merging batch");
    let mut stats = ApplyStats::default();

    {
        let mut db = shared.write_db();
        for message in batch.iter_mut() {
            match message {
                MergeMessage::Job(job) => {
                    for file in &mut job.files {
                        if let Some(delta) = file.delta.take() {
                            let rebased = db.rebase(delta, file.based_on.as_ref());
                            stats.accumulate(db.apply(&Delta::from(rebased)));
                        }
                    }
                }
                MergeMessage::RemoveFile(path) => {
                    if let Some(removed) = db.remove_file(path) {
                        stats.accumulate(removed);
                    } else {
                        trace!(file = %path.display(), "Removal of a file that was never indexed");
                    }
                }
            }
        }
    }

    for message in batch.drain(..) {
        match message {
            MergeMessage::Job(job) => finish_job(shared, job),
            MergeMessage::RemoveFile(path) => finish_removal(shared, &path),
        }
    }
    stats
}

fn finish_job(shared: &Shared, job: MergeJob) {
    let MergeJob {
        path,
        files,
        error,
        from_cache,
        owned,
    } = job;

    shared.status.files_applied(files.len());
    for file in files {
        let file_path = &file.path;
        match file.last_modified {
            Some(time) => shared.timestamps.update(file_path, time),
            None => shared.timestamps.invalidate(file_path),
        }
        if let Some(entry) = file.cache_entry.filter(|_| shared.settings.enable_cache_write)
            && let Err(e) = shared.snapshots.save(file_path, entry)
        {
            warn!(file = %file_path.display(), error = %e, "Failed to write cache entry");
            shared.status.record_error(IndexError::cache_write(file_path.clone(), &e));
        }
    }
    drop(owned);

    let state = match error {
        Some(error) => {
            shared.status.job_failed(error);
            JobState::Failed
        }
        None => {
            shared.status.job_applied(from_cache);
            JobState::Applied
        }
    };
    trace!(file = %path.display(), state = %state, "Job finished");
    complete(shared, path);
}

/// Retire a finished job, or requeue it if requests arrived while it ran.
fn complete(shared: &Shared, path: PathBuf) {
    let mut tracker = shared.tracker();
    let Some(job) = tracker.jobs.get_mut(&path) else {
        return;
    };
    if !job.rerun {
        tracker.jobs.remove(&path);
        if tracker.is_idle() {
            shared.idle.notify_all();
        }
        return;
    }

    job.state = JobState::Queued;
    job.interactive = job.rerun_interactive;
    job.rerun = false;
    job.rerun_interactive = false;
    let interactive = job.interactive;
    drop(tracker);

    shared.status.job_queued();
    let requeued = shared
        .queues()
        .is_some_and(|queues| queues.for_priority(interactive).send(path.clone()).is_ok());
    if requeued {
        debug!(file = %path.display(), "Requeued job for requests that arrived while it ran");
    } else {
        // Shutting down; nobody will pick the rerun up.
        shared.status.job_started();
        shared.status.job_merge_queued();
        shared.status.job_failed(IndexError::new(
            path.clone(),
            crate::error::IndexErrorKind::Internal,
            "pipeline shut down before rerun",
        ));
        let mut tracker = shared.tracker();
        tracker.jobs.remove(&path);
        if tracker.is_idle() {
            shared.idle.notify_all();
        }
    }
}

fn finish_removal(shared: &Shared, path: &std::path::Path) {
    shared.timestamps.invalidate(path);
    if let Err(e) = shared.snapshots.remove(path) {
        warn!(file = %path.display(), error = %e, "Failed to remove cache entry");
    }
    let mut tracker = shared.tracker();
    tracker.removals = tracker.removals.saturating_sub(1);
    if tracker.is_idle() {
        shared.idle.notify_all();
    }
}
