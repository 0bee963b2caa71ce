//! Worker threads: freshness check, extraction, remapping and diffing.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError, select};
use nereid_cache::CacheEntry;
use tracing::{debug, error, info, trace, warn};

use super::merge::{FileJob, MergeJob, MergeMessage};
use super::{JobState, Shared};
use crate::delta::diff;
use crate::error::{IndexError, IndexErrorKind};
use crate::extract::RawExtractionRecord;
use crate::ownership::OwnedFiles;
use crate::path::{last_modified, normalize};
use crate::remap::remap;
use crate::snapshot::RemappedSnapshot;
use crate::snapshot_cache::CachedSnapshot;

/// Source file extensions. Two arguments that both name a source file compare
/// equal, so moving a compile command between files does not force a reparse.
const SOURCE_EXTENSIONS: [&str; 7] = [".h", ".c", ".cc", ".cpp", ".hpp", ".m", ".mm"];

fn is_source_file(arg: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| arg.ends_with(ext))
}

/// Whether two argument lists are the same up to source file names.
pub(crate) fn same_args(previous: &[String], current: &[String]) -> bool {
    previous.len() == current.len()
        && previous
            .iter()
            .zip(current)
            .all(|(a, b)| a == b || (is_source_file(a) && is_source_file(b)))
}

/// Result of the freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    /// Cached snapshots can be replayed
    Fresh,
    /// Something changed; run the engine
    Changed(&'static str),
    /// The file is gone and has no unsaved buffer
    Vanished,
}

/// Worker loop. Interactive requests are always taken before background ones.
#[allow(clippy::needless_pass_by_value)] // Receivers and sender are owned by the thread
pub(crate) fn run(
    shared: Arc<Shared>,
    interactive: Receiver<PathBuf>,
    background: Receiver<PathBuf>,
    merge: Sender<MergeMessage>,
) {
    loop {
        // Once one queue is closed, drain the other before exiting.
        let next = match interactive.try_recv() {
            Ok(path) => Some(path),
            Err(TryRecvError::Disconnected) => background.recv().ok(),
            Err(TryRecvError::Empty) => select! {
                recv(interactive) -> msg => msg.ok().or_else(|| background.recv().ok()),
                recv(background) -> msg => msg.ok().or_else(|| interactive.recv().ok()),
            },
        };
        let Some(path) = next else {
            trace!("Request queues closed, worker exiting");
            break;
        };

        let Some(is_interactive) = start(&shared, &path) else {
            trace!(file = %path.display(), "Discarding superseded queue entry");
            continue;
        };

        let job = panic::catch_unwind(AssertUnwindSafe(|| process(&shared, &path, is_interactive)))
            .unwrap_or_else(|payload| {
                let msg = panic_message(payload.as_ref());
                error!(file = %path.display(), panic_msg = %msg, "Indexing job panicked");
                MergeJob::failed(
                    path.clone(),
                    IndexError::new(path.clone(), IndexErrorKind::Internal, msg),
                    OwnedFiles::new(Arc::clone(&shared.ownership)),
                )
            });

        shared.set_state(&path, JobState::MergeQueued);
        shared.status.job_merge_queued();
        if merge.send(MergeMessage::Job(job)).is_err() {
            error!(file = %path.display(), "Merge thread is gone; dropping job");
            break;
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Claim a queued job. Returns its priority, or `None` if the queue entry is
/// stale (the job already started from the other queue, or finished).
fn start(shared: &Shared, path: &Path) -> Option<bool> {
    let mut tracker = shared.tracker();
    let job = tracker.jobs.get_mut(path)?;
    if job.state != JobState::Queued {
        return None;
    }
    job.state = JobState::Parsing;
    let interactive = job.interactive;
    drop(tracker);
    shared.status.job_started();
    Some(interactive)
}

/// Run one job up to the point where it is ready to merge.
fn process(shared: &Shared, path: &Path, interactive: bool) -> MergeJob {
    let args = shared.project.args_for(path);
    let unsaved = shared.unsaved();
    let mut owned = OwnedFiles::new(Arc::clone(&shared.ownership));

    let cached = if shared.settings.enable_cache_read {
        shared.snapshots.try_load(path)
    } else {
        None
    };

    let freshness = check_freshness(path, &args, interactive, cached.as_deref(), unsaved.contains_key(path));
    match freshness {
        Freshness::Vanished => {
            warn!(file = %path.display(), "File vanished before indexing");
            return MergeJob::failed(path.to_path_buf(), IndexError::file_vanished(path.to_path_buf()), owned);
        }
        Freshness::Fresh => {
            if let Some(cached) = cached {
                info!(file = %path.display(), "Skipping parse; nothing changed since last index");
                let files = replay(shared, &cached, &mut owned);
                return MergeJob::applied(path.to_path_buf(), files, owned, true);
            }
        }
        Freshness::Changed(reason) => {
            debug!(file = %path.display(), reason, "Re-extracting");
        }
    }

    let records = match shared.engine.extract(path, &args, &unsaved) {
        Ok(records) => records,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Extraction failed");
            return MergeJob::failed(path.to_path_buf(), IndexError::engine_failed(path.to_path_buf(), &e), owned);
        }
    };

    shared.set_state(path, JobState::Remapping);
    let mut remapped = Vec::with_capacity(records.len());
    for record in records {
        let file = normalize(&record.path);
        if !owned.try_own(&file) {
            shared.status.file_skipped();
            continue;
        }
        remapped.push(remap_record(shared, record, &args));
    }

    shared.set_state(path, JobState::Diffing);
    let files = remapped
        .into_iter()
        .map(|(snapshot, text)| {
            let snapshot = Arc::new(snapshot);
            // Editor contents never reach the cache or the timestamp map.
            let entry = (!unsaved.contains_key(&snapshot.path)).then(|| {
                Arc::new(CacheEntry {
                    last_modified: snapshot.last_modified,
                    text,
                    payload: RemappedSnapshot::clone(&snapshot),
                })
            });
            diff_against_database(shared, snapshot, entry)
        })
        .collect();

    MergeJob::applied(path.to_path_buf(), files, owned, false)
}

fn remap_record(shared: &Shared, record: RawExtractionRecord, args: &[String]) -> (RemappedSnapshot, String) {
    let (mut snapshot, stats) = {
        let db = shared.read_db();
        remap(&record, &*db)
    };
    if snapshot.args.is_empty() {
        snapshot.args = args.to_vec();
    }
    trace!(
        file = %snapshot.path.display(),
        entries = stats.entries,
        new_symbols = stats.new_symbols,
        dangling = stats.dangling_refs,
        conflicts = stats.category_conflicts,
        "Remapped record"
    );
    (snapshot, record.text)
}

/// Diff `snapshot` against what the database currently holds for its file.
fn diff_against_database(
    shared: &Shared,
    snapshot: Arc<RemappedSnapshot>,
    cache_entry: Option<Arc<CachedSnapshot>>,
) -> FileJob {
    let based_on = shared.read_db().snapshot(&snapshot.path).cloned();
    let delta = diff(based_on.as_deref(), Arc::clone(&snapshot));
    FileJob {
        path: snapshot.path.clone(),
        delta: Some(delta),
        based_on,
        last_modified: cache_entry.as_ref().map(|entry| entry.last_modified),
        cache_entry,
    }
}

/// Emit cached snapshots for the file and every dependency this job can own.
///
/// A dependency is replayed only if its own entry matches the file on disk,
/// and nothing is emitted for a version the database already holds.
fn replay(shared: &Shared, cached: &CachedSnapshot, owned: &mut OwnedFiles) -> Vec<FileJob> {
    let mut files = Vec::new();
    let main = &cached.payload;
    if shared.timestamps.get_cached(&main.path) == Some(cached.last_modified) {
        trace!(file = %main.path.display(), "Database already holds this version");
    } else if owned.try_own(&main.path) {
        files.push(replayed(shared, cached));
    } else {
        shared.status.file_skipped();
    }

    for dependency in main.dependencies.keys() {
        if !owned.try_own(dependency) {
            shared.status.file_skipped();
            continue;
        }
        // Another job may be writing this header's slot; a miss just means
        // that job emits it instead.
        let Some(entry) = shared.snapshots.take_or_load(dependency) else {
            trace!(file = %dependency.display(), "No cached snapshot for dependency");
            continue;
        };
        if last_modified(dependency) != Some(entry.last_modified) {
            trace!(file = %dependency.display(), "Cached dependency is older than the file");
            continue;
        }
        if shared.timestamps.get_cached(dependency) == Some(entry.last_modified) {
            continue;
        }
        files.push(replayed(shared, &entry));
    }
    files
}

fn replayed(shared: &Shared, entry: &CachedSnapshot) -> FileJob {
    let mut file = diff_against_database(shared, Arc::new(entry.payload.clone()), None);
    file.last_modified = Some(entry.last_modified);
    file
}

/// Decide whether the cached entry still describes the file on disk.
///
/// Only the entry itself is trusted: its recorded modification time for the
/// file, and the modification time each dependency had when it was extracted.
fn check_freshness(
    path: &Path,
    args: &[String],
    interactive: bool,
    cached: Option<&CachedSnapshot>,
    has_unsaved: bool,
) -> Freshness {
    let Some(current) = last_modified(path) else {
        return if has_unsaved {
            Freshness::Changed("unsaved buffer")
        } else {
            Freshness::Vanished
        };
    };
    if has_unsaved {
        return Freshness::Changed("unsaved buffer");
    }
    let Some(cached) = cached else {
        return Freshness::Changed("no cached snapshot");
    };
    if interactive {
        return Freshness::Changed("interactive request");
    }
    if cached.last_modified != current {
        return Freshness::Changed("cached snapshot is stale");
    }
    if !same_args(&cached.payload.args, args) {
        return Freshness::Changed("arguments changed");
    }
    for (dependency, recorded) in &cached.payload.dependencies {
        let current = last_modified(dependency);
        if current.is_none() || current != *recorded {
            trace!(file = %path.display(), dependency = %dependency.display(), "Dependency changed");
            return Freshness::Changed("dependency changed");
        }
    }
    Freshness::Fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[rstest]
    #[case(&["clang", "-O2", "a.cc"], &["clang", "-O2", "b.cpp"], true)]
    #[case(&["clang", "-O2"], &["clang", "-O3"], false)]
    #[case(&["clang"], &["clang", "-g"], false)]
    #[case(&["clang", "x.h"], &["clang", "-DX"], false)]
    fn source_file_arguments_compare_equal(#[case] a: &[&str], #[case] b: &[&str], #[case] same: bool) {
        assert_eq!(same_args(&args(a), &args(b)), same);
    }

    fn cached_at(path: &Path, time: i64, dependencies: &[(&Path, Option<i64>)]) -> CachedSnapshot {
        let mut payload = RemappedSnapshot::empty(path.to_path_buf(), time);
        payload.args = args(&["clang"]);
        payload.dependencies = dependencies.iter().map(|(dep, t)| (dep.to_path_buf(), *t)).collect();
        CacheEntry {
            last_modified: time,
            text: String::new(),
            payload,
        }
    }

    fn is_fresh(freshness: &Freshness) -> bool {
        matches!(freshness, Freshness::Fresh)
    }

    #[test]
    fn entry_matching_disk_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.cc");
        let header = dir.path().join("a.h");
        std::fs::write(&source, "").unwrap();
        std::fs::write(&header, "").unwrap();
        let time = last_modified(&source).unwrap();
        let cached = cached_at(&source, time, &[(header.as_path(), last_modified(&header))]);

        let freshness = check_freshness(&source, &args(&["clang"]), false, Some(&cached), false);
        assert!(is_fresh(&freshness));
    }

    #[test]
    fn entry_recorded_at_another_time_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.cc");
        std::fs::write(&source, "").unwrap();
        let cached = cached_at(&source, last_modified(&source).unwrap() - 1, &[]);

        let freshness = check_freshness(&source, &args(&["clang"]), false, Some(&cached), false);
        assert!(matches!(freshness, Freshness::Changed("cached snapshot is stale")));
    }

    #[test]
    fn dependency_recorded_time_drives_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.cc");
        let header = dir.path().join("a.h");
        std::fs::write(&source, "").unwrap();
        std::fs::write(&header, "").unwrap();
        let time = last_modified(&source).unwrap();
        let header_time = last_modified(&header).unwrap();

        let moved = cached_at(&source, time, &[(header.as_path(), Some(header_time + 1))]);
        let freshness = check_freshness(&source, &args(&["clang"]), false, Some(&moved), false);
        assert!(matches!(freshness, Freshness::Changed("dependency changed")));

        let unknown = cached_at(&source, time, &[(header.as_path(), None)]);
        let freshness = check_freshness(&source, &args(&["clang"]), false, Some(&unknown), false);
        assert!(matches!(freshness, Freshness::Changed("dependency changed")));

        let gone = dir.path().join("gone.h");
        let missing = cached_at(&source, time, &[(gone.as_path(), Some(header_time))]);
        let freshness = check_freshness(&source, &args(&["clang"]), false, Some(&missing), false);
        assert!(matches!(freshness, Freshness::Changed("dependency changed")));
    }

    #[test]
    fn missing_file_with_unsaved_buffer_is_changed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.cc");
        assert!(matches!(check_freshness(&source, &[], false, None, false), Freshness::Vanished));
        assert!(matches!(
            check_freshness(&source, &[], false, None, true),
            Freshness::Changed("unsaved buffer")
        ));
    }
}
