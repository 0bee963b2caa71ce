//! Pipeline counters.
//!
//! Gauges (`queued`, `parsing`, `merging`) go up and down as jobs move.
//! Totals only grow. Every counter is an atomic so [`PipelineStatus::stats`]
//! can be read at any time without stopping the pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::error::IndexError;

/// Live counters shared by the coordinator, workers and the merge thread.
#[derive(Debug, Default)]
pub(crate) struct PipelineStatus {
    queued: AtomicUsize,
    parsing: AtomicUsize,
    merging: AtomicUsize,
    applied: AtomicUsize,
    failed: AtomicUsize,
    from_cache: AtomicUsize,
    coalesced: AtomicUsize,
    filtered: AtomicUsize,
    files_applied: AtomicUsize,
    files_skipped: AtomicUsize,
    errors: Mutex<Vec<IndexError>>,
}

/// A point-in-time copy of the pipeline counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Jobs waiting in a queue
    pub queued: usize,
    /// Jobs checking freshness, extracting, remapping or diffing
    pub parsing: usize,
    /// Jobs waiting for or inside the merge thread
    pub merging: usize,
    /// Jobs whose deltas were applied
    pub applied: usize,
    /// Jobs dropped after an error
    pub failed: usize,
    /// Jobs answered from the cache without running the engine
    pub from_cache: usize,
    /// Requests folded into an existing job
    pub coalesced: usize,
    /// Requests rejected by the path filter
    pub filtered: usize,
    /// File deltas applied
    pub files_applied: usize,
    /// Records skipped because another job owned the file
    pub files_skipped: usize,
    /// Per-file errors, oldest first
    #[serde(skip)]
    pub errors: Vec<IndexError>,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn drop_one(counter: &AtomicUsize) {
    // Saturate rather than wrap if a transition is ever reported twice.
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
}

impl PipelineStatus {
    pub(crate) fn job_queued(&self) {
        bump(&self.queued);
    }

    pub(crate) fn job_started(&self) {
        drop_one(&self.queued);
        bump(&self.parsing);
    }

    pub(crate) fn job_merge_queued(&self) {
        drop_one(&self.parsing);
        bump(&self.merging);
    }

    pub(crate) fn job_applied(&self, from_cache: bool) {
        drop_one(&self.merging);
        bump(&self.applied);
        if from_cache {
            bump(&self.from_cache);
        }
    }

    pub(crate) fn job_failed(&self, error: IndexError) {
        drop_one(&self.merging);
        bump(&self.failed);
        self.record_error(error);
    }

    pub(crate) fn record_error(&self, error: IndexError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    pub(crate) fn request_coalesced(&self) {
        bump(&self.coalesced);
    }

    pub(crate) fn request_filtered(&self) {
        bump(&self.filtered);
    }

    pub(crate) fn files_applied(&self, count: usize) {
        self.files_applied.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn file_skipped(&self) {
        bump(&self.files_skipped);
    }

    /// Copy the counters.
    pub(crate) fn stats(&self) -> PipelineStats {
        PipelineStats {
            queued: self.queued.load(Ordering::Relaxed),
            parsing: self.parsing.load(Ordering::Relaxed),
            merging: self.merging.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            from_cache: self.from_cache.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            files_applied: self.files_applied.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            errors: self
                .errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}
