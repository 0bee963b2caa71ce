//! Extraction engines that need no compiler front end.
//!
//! - [`DumpEngine`] reads records that an out-of-process front end already
//!   wrote to disk.
//! - [`FixtureEngine`] serves canned records from memory, for tests and
//!   embedding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use nereid_cache::slot_name;
use tracing::{debug, trace};

use crate::extract::{EngineError, ExtractionEngine, RawExtractionRecord, UnsavedBuffers};
use crate::path::{Timestamp, last_modified};
use crate::session::SessionCache;

/// Dumps kept decoded in memory.
const DUMP_SESSION_CAPACITY: usize = 32;

/// A decoded dump and the modification time of its file.
#[derive(Debug)]
struct Dump {
    modified: Option<Timestamp>,
    records: Vec<RawExtractionRecord>,
}

/// Reads `<dump_dir>/<slot-name>.json`, a JSON array of records.
///
/// Decoded dumps are retained until their file changes on disk. Unsaved
/// buffers are ignored; the dump reflects whatever the front end saw.
#[derive(Debug)]
pub struct DumpEngine {
    dump_dir: PathBuf,
    sessions: SessionCache<Dump>,
}

impl DumpEngine {
    /// An engine reading dumps from `dump_dir`.
    #[must_use]
    pub fn new(dump_dir: impl Into<PathBuf>) -> Self {
        Self {
            dump_dir: dump_dir.into(),
            sessions: SessionCache::new(DUMP_SESSION_CAPACITY),
        }
    }

    /// Where the dump for `path` is expected.
    #[must_use]
    pub fn dump_path(&self, path: &Path) -> PathBuf {
        self.dump_dir.join(format!("{}.json", slot_name(path)))
    }

    fn read_dump(dump_path: &Path) -> Result<Dump, EngineError> {
        let modified = last_modified(dump_path);
        let bytes = std::fs::read(dump_path)
            .map_err(|e| EngineError::new(format!("no dump at {}: {e}", dump_path.display())))?;
        let records = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::new(format!("malformed dump {}: {e}", dump_path.display())))?;
        trace!(dump = %dump_path.display(), "Decoded dump");
        Ok(Dump { modified, records })
    }
}

impl ExtractionEngine for DumpEngine {
    fn extract(
        &self,
        path: &Path,
        _args: &[String],
        _unsaved: &UnsavedBuffers,
    ) -> Result<Vec<RawExtractionRecord>, EngineError> {
        let dump_path = self.dump_path(path);
        if let Some(dump) = self.sessions.try_get(path) {
            if dump.modified.is_some() && dump.modified == last_modified(&dump_path) {
                return Ok(dump.records.clone());
            }
            debug!(file = %path.display(), "Dump changed on disk");
            let _ = self.sessions.take(path);
        }
        let dump = self.sessions.get_or_try_create(path, || Self::read_dump(&dump_path))?;
        Ok(dump.records.clone())
    }
}

#[derive(Debug, Default)]
struct Fixtures {
    records: HashMap<PathBuf, Vec<RawExtractionRecord>>,
    failures: HashMap<PathBuf, String>,
}

/// Serves records registered ahead of time.
///
/// Fixtures can be replaced while a pipeline is running. Paths with no
/// fixture fail with an [`EngineError`].
#[derive(Debug, Default)]
pub struct FixtureEngine {
    fixtures: Mutex<Fixtures>,
    calls: AtomicUsize,
}

impl FixtureEngine {
    /// An engine with no fixtures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Fixtures> {
        self.fixtures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `records` when `path` is extracted, clearing any injected failure.
    pub fn set_records(&self, path: impl Into<PathBuf>, records: Vec<RawExtractionRecord>) {
        let path = path.into();
        let mut fixtures = self.lock();
        fixtures.failures.remove(&path);
        fixtures.records.insert(path, records);
    }

    /// Fail every extraction of `path` with `message`.
    pub fn fail(&self, path: impl Into<PathBuf>, message: impl Into<String>) {
        self.lock().failures.insert(path.into(), message.into());
    }

    /// Number of `extract` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExtractionEngine for FixtureEngine {
    fn extract(
        &self,
        path: &Path,
        _args: &[String],
        _unsaved: &UnsavedBuffers,
    ) -> Result<Vec<RawExtractionRecord>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fixtures = self.lock();
        if let Some(message) = fixtures.failures.get(path) {
            return Err(EngineError::new(message.clone()));
        }
        fixtures
            .records
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::new(format!("no fixture for {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RawEntry;
    use crate::types::Category;

    fn record(path: &str, usr: &str) -> RawExtractionRecord {
        RawExtractionRecord {
            path: PathBuf::from(path),
            last_modified: 1,
            text: String::new(),
            args: Vec::new(),
            dependencies: Vec::new(),
            entries: vec![RawEntry::new(0, Category::Func, usr)],
        }
    }

    #[test]
    fn fixture_engine_serves_and_counts() {
        let engine = FixtureEngine::new();
        engine.set_records("/a.cc", vec![record("/a.cc", "c:@F@a#")]);

        let records = engine.extract(Path::new("/a.cc"), &[], &UnsavedBuffers::new()).unwrap();

        assert_eq!(records.len(), 1);
        assert!(engine.extract(Path::new("/b.cc"), &[], &UnsavedBuffers::new()).is_err());
        assert_eq!(engine.calls(), 2);
    }

    #[test]
    fn fixture_engine_injected_failure_until_replaced() {
        let engine = FixtureEngine::new();
        engine.set_records("/a.cc", vec![record("/a.cc", "c:@F@a#")]);
        engine.fail("/a.cc", "expected ';'");

        let err = engine.extract(Path::new("/a.cc"), &[], &UnsavedBuffers::new()).unwrap_err();
        assert_eq!(err.message, "expected ';'");

        engine.set_records("/a.cc", vec![record("/a.cc", "c:@F@a#")]);
        assert!(engine.extract(Path::new("/a.cc"), &[], &UnsavedBuffers::new()).is_ok());
    }

    #[test]
    fn dump_engine_reads_slot_named_json() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DumpEngine::new(dir.path());
        let source = Path::new("/src/a.cc");
        let dump = vec![record("/src/a.cc", "c:@F@a#"), record("/src/a.h", "c:@S@A")];
        std::fs::write(engine.dump_path(source), serde_json::to_vec(&dump).unwrap()).unwrap();

        let records = engine.extract(source, &[], &UnsavedBuffers::new()).unwrap();

        assert_eq!(records, dump);
        assert!(engine.dump_path(source).ends_with("%2Fsrc%2Fa%2Ecc.json"));
    }

    #[test]
    fn dump_engine_rereads_changed_dump() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DumpEngine::new(dir.path());
        let source = Path::new("/src/a.cc");
        let dump_path = engine.dump_path(source);
        std::fs::write(&dump_path, serde_json::to_vec(&vec![record("/src/a.cc", "x")]).unwrap()).unwrap();
        assert_eq!(engine.extract(source, &[], &UnsavedBuffers::new()).unwrap().len(), 1);

        std::fs::remove_file(&dump_path).unwrap();

        assert!(engine.extract(source, &[], &UnsavedBuffers::new()).is_err());
    }

    #[test]
    fn dump_engine_reports_malformed_dump() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DumpEngine::new(dir.path());
        let source = Path::new("/src/a.cc");
        std::fs::write(engine.dump_path(source), b"not json").unwrap();

        let err = engine.extract(source, &[], &UnsavedBuffers::new()).unwrap_err();
        assert!(err.message.contains("malformed dump"));
    }
}
