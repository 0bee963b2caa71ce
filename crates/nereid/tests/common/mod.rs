//! Shared builders for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nereid::db::ApplyStats;
use nereid::delta::diff;
use nereid::extract::{RawDefinition, RawDependency, RawRef};
use nereid::remap::remap;
use nereid::snapshot::SymbolDef;
use nereid::{Category, Delta, RawEntry, RawExtractionRecord, Role, Span, StableId, SymbolDatabase, Use};
use tempfile::TempDir;

/// An entry with a display name.
pub fn entry(index: u32, category: Category, usr: &str) -> RawEntry {
    let mut entry = RawEntry::new(index, category, usr);
    entry.detailed_name = usr.to_string();
    entry.short_name_len = u16::try_from(usr.len()).expect("short usr");
    entry
}

/// An entry defined on `line`.
pub fn defined(index: u32, category: Category, usr: &str, line: u32) -> RawEntry {
    let mut entry = entry(index, category, usr);
    entry.definition = Some(RawDefinition {
        spell: Span::line(line, 5, 6),
        extent: Span::line(line, 1, 20),
    });
    entry.declarations.push(Span::line(line, 5, 6));
    entry
}

/// An entry that is only called, on each of `lines`.
pub fn called(index: u32, usr: &str, lines: &[u32]) -> RawEntry {
    let mut entry = entry(index, Category::Func, usr);
    entry.uses = lines
        .iter()
        .map(|line| Use::new(Span::line(*line, 3, 4), Role::CALL | Role::REFERENCE))
        .collect();
    entry
}

/// A function defined on `line` that calls `callees` by signature.
pub fn caller(index: u32, usr: &str, line: u32, callees: &[&str]) -> RawEntry {
    let mut entry = defined(index, Category::Func, usr, line);
    entry.callees = callees.iter().map(|c| RawRef::External((*c).to_string())).collect();
    entry
}

/// A record for `path` with the given direct includes.
pub fn record(path: &Path, last_modified: i64, includes: &[&Path], entries: Vec<RawEntry>) -> RawExtractionRecord {
    RawExtractionRecord {
        path: path.to_path_buf(),
        last_modified,
        text: format!("// {}", path.display()),
        args: Vec::new(),
        dependencies: includes
            .iter()
            .map(|p| RawDependency {
                path: p.to_path_buf(),
                last_modified: nereid::path::last_modified(p),
            })
            .collect(),
        entries,
    }
}

/// Remap, diff and apply one record the way the pipeline does.
pub fn index(db: &mut SymbolDatabase, record: &RawExtractionRecord) -> ApplyStats {
    let (snapshot, _) = remap(record, &*db);
    let previous = db.snapshot(&snapshot.path).cloned();
    db.apply(&Delta::from(diff(previous.as_deref(), Arc::new(snapshot))))
}

/// Every contribution in the database, keyed by path rather than file id.
pub type Fingerprint = BTreeMap<(Category, StableId), BTreeMap<PathBuf, SymbolDef>>;

pub fn fingerprint(db: &SymbolDatabase) -> Fingerprint {
    let mut out = Fingerprint::new();
    for category in Category::ALL {
        for def in db.defs(category) {
            let contributions = def
                .contributors()
                .filter_map(|file| {
                    let path = db.path_of(file)?.to_path_buf();
                    Some((path, def.contribution(file)?.clone()))
                })
                .collect();
            out.insert((category, def.id()), contributions);
        }
    }
    out
}

/// A project directory holding the given files.
pub fn project_with_files(files: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let root = nereid::path::normalize(dir.path());
    let paths = files
        .iter()
        .map(|(name, content)| {
            let path = root.join(name);
            fs::write(&path, content).expect("should write file");
            path
        })
        .collect();
    (dir, paths)
}

/// Modification time of a file that must exist.
pub fn mtime(path: &Path) -> i64 {
    nereid::path::last_modified(path).expect("file should exist")
}
