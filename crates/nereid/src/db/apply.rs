//! Delta application.

use std::sync::Arc;

use tracing::{debug, trace};

use super::{Def, FileRecord, SymbolDatabase};
use crate::delta::{self, Delta, DefUpdate, FileDelta};
use crate::snapshot::RemappedSnapshot;
use crate::types::{Category, FileId, StableId};

/// Counters describing one apply.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    /// File deltas that recorded a snapshot
    pub files_updated: usize,
    /// File deltas that removed a file
    pub files_removed: usize,
    /// Defs created
    pub symbols_created: usize,
    /// Defs deleted because their last contributor went away
    pub symbols_removed: usize,
    /// Per-id updates applied
    pub updates: usize,
}

impl ApplyStats {
    /// Add another apply's counters to these.
    pub fn accumulate(&mut self, other: ApplyStats) {
        self.files_updated += other.files_updated;
        self.files_removed += other.files_removed;
        self.symbols_created += other.symbols_created;
        self.symbols_removed += other.symbols_removed;
        self.updates += other.updates;
    }
}

impl SymbolDatabase {
    /// Apply a delta.
    ///
    /// File deltas are applied in order. Applying the same delta twice leaves
    /// the database as it was after the first application. Cost is linear in
    /// the size of the delta, never in the size of the database.
    pub fn apply(&mut self, delta: &Delta) -> ApplyStats {
        let mut stats = ApplyStats::default();
        for file in &delta.files {
            self.apply_file(file, &mut stats);
        }
        stats
    }

    /// Retract everything `path` contributes and forget the file.
    ///
    /// Returns `None` if the file was not indexed.
    pub fn remove_file(&mut self, path: &std::path::Path) -> Option<ApplyStats> {
        let previous = Arc::clone(&self.file(path)?.snapshot);
        Some(self.apply(&Delta::from(delta::removal(&previous))))
    }

    /// Re-target a delta computed against `based_on` at the file's current
    /// snapshot.
    ///
    /// A delta is only valid against the snapshot it was diffed from. If the
    /// file changed in between (for example it was removed while its job was
    /// running), the delta is recomputed from the recorded snapshot.
    #[must_use]
    pub fn rebase(&self, file_delta: FileDelta, based_on: Option<&Arc<RemappedSnapshot>>) -> FileDelta {
        let current = self.snapshot(&file_delta.path);
        let unchanged = match (current, based_on) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            return file_delta;
        }

        debug!(file = %file_delta.path.display(), "Rebasing stale delta");
        match file_delta.snapshot {
            Some(snapshot) => delta::diff(current.map(|s| &**s), snapshot),
            None => match current {
                Some(current) => delta::removal(current),
                None => file_delta,
            },
        }
    }

    fn apply_file(&mut self, file_delta: &FileDelta, stats: &mut ApplyStats) {
        let file = self.intern(&file_delta.path);

        for category in Category::ALL {
            let changes = file_delta.category(category);
            for id in &changes.removed {
                self.retract(category, *id, file, stats);
            }
            for update in &changes.updates {
                self.contribute(category, file, update, stats);
            }
        }

        match &file_delta.snapshot {
            Some(snapshot) => {
                self.includes
                    .set_dependencies(&file_delta.path, snapshot.dependencies.keys());
                self.files.insert(
                    file,
                    FileRecord {
                        id: file,
                        path: file_delta.path.clone(),
                        snapshot: Arc::clone(snapshot),
                    },
                );
                stats.files_updated += 1;
            }
            None => {
                self.includes.remove_file(&file_delta.path);
                if let Some(record) = self.files.remove(&file) {
                    debug_assert!(
                        record
                            .snapshot
                            .iter()
                            .all(|(c, id, _)| self.def_in(c, id).is_none_or(|d| d.contribution(file).is_none())),
                        "removal delta for {} left contributions behind",
                        file_delta.path.display()
                    );
                }
                stats.files_removed += 1;
            }
        }

        trace!(
            file = %file_delta.path.display(),
            changes = file_delta.len(),
            removal = file_delta.is_removal(),
            "Applied file delta"
        );
    }

    fn retract(&mut self, category: Category, id: StableId, file: FileId, stats: &mut ApplyStats) {
        let defs = self.defs.get_mut(category);
        let Some(def) = defs.get_mut(&id) else {
            return;
        };
        if def.contributions.remove(&file).is_none() || def.provenance() > 0 {
            return;
        }

        debug_assert_eq!(def.provenance(), 0, "deleting {category} {id} with remaining provenance");
        defs.remove(&id);
        stats.symbols_removed += 1;

        if self.usr_to_symbol.get(&id) == Some(&category) {
            self.usr_to_symbol.remove(&id);
            // Another category may still hold the id after a signature collision.
            if let Some(other) = Category::ALL
                .into_iter()
                .find(|c| self.defs.get(*c).contains_key(&id))
            {
                self.usr_to_symbol.insert(id, other);
            }
        }
    }

    fn contribute(&mut self, category: Category, file: FileId, update: &DefUpdate, stats: &mut ApplyStats) {
        let def = self
            .defs
            .get_mut(category)
            .entry(update.id)
            .or_insert_with(|| {
                stats.symbols_created += 1;
                Def::new(update.id, category)
            });
        if !update.id.is_unknown() {
            self.usr_to_symbol.entry(update.id).or_insert(category);
        }

        let contribution = def.contributions.entry(file).or_default();
        contribution.info.clone_from(&update.info);
        update.declarations.apply_to(&mut contribution.declarations);
        update.uses.apply_to(&mut contribution.uses);
        for (kind, changes) in &update.relations {
            let targets = contribution.relations.entry(*kind).or_default();
            changes.apply_to(targets);
            if targets.is_empty() {
                contribution.relations.remove(kind);
            }
        }
        stats.updates += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::diff;
    use crate::types::{DefInfo, Role, Span, Use};
    use std::path::{Path, PathBuf};

    fn file(path: &str, funcs: &[(u64, bool, &[u32])]) -> Arc<RemappedSnapshot> {
        let mut s = RemappedSnapshot::empty(PathBuf::from(path), 1);
        for (id, defines, lines) in funcs {
            let def = s.funcs.entry(StableId(*id)).or_default();
            if *defines {
                def.info = Some(DefInfo {
                    detailed_name: format!("f{id}"),
                    spell: Some(Span::line(1, 1, 3)),
                    ..DefInfo::default()
                });
            }
            for line in *lines {
                def.uses.insert(Use::new(Span::line(*line, 1, 2), Role::CALL));
            }
        }
        Arc::new(s)
    }

    fn index(db: &mut SymbolDatabase, snapshot: &Arc<RemappedSnapshot>) -> ApplyStats {
        let previous = db.snapshot(&snapshot.path).cloned();
        db.apply(&Delta::from(diff(previous.as_deref(), Arc::clone(snapshot))))
    }

    #[test]
    fn reference_only_file_does_not_overwrite_definition() {
        let mut db = SymbolDatabase::new();
        index(&mut db, &file("/a.h", &[(300, true, &[])]));
        index(&mut db, &file("/b.cc", &[(300, false, &[4])]));

        let def = db.def(StableId(300)).unwrap();
        let (definer, info) = def.definition().unwrap();
        assert_eq!(db.path_of(definer), Some(Path::new("/a.h")));
        assert_eq!(info.detailed_name, "f300");
        assert_eq!(def.provenance(), 2);
    }

    #[test]
    fn def_survives_until_last_contributor_leaves() {
        let mut db = SymbolDatabase::new();
        index(&mut db, &file("/a.h", &[(300, true, &[])]));
        index(&mut db, &file("/b.cc", &[(300, false, &[4])]));

        db.remove_file(Path::new("/a.h")).unwrap();
        let def = db.def(StableId(300)).unwrap();
        assert!(def.definition().is_none());
        assert_eq!(def.uses().count(), 1);

        let stats = db.remove_file(Path::new("/b.cc")).unwrap();
        assert_eq!(stats.symbols_removed, 1);
        assert!(db.def(StableId(300)).is_none());
        assert!(db.file(Path::new("/b.cc")).is_none());
    }

    #[test]
    fn remove_unknown_file_is_none() {
        let mut db = SymbolDatabase::new();
        assert!(db.remove_file(Path::new("/nope.cc")).is_none());
    }

    #[test]
    fn rebase_recomputes_against_current_snapshot() {
        let mut db = SymbolDatabase::new();
        let v1 = file("/a.cc", &[(300, true, &[1, 2])]);
        index(&mut db, &v1);

        // A job diffed v2 against v1, but the file was removed meanwhile.
        let v2 = file("/a.cc", &[(300, true, &[2, 3])]);
        let stale = diff(Some(&v1), Arc::clone(&v2));
        db.remove_file(Path::new("/a.cc"));

        let rebased = db.rebase(stale, Some(&v1));
        db.apply(&Delta::from(rebased));

        let uses: Vec<u32> = db
            .def(StableId(300))
            .unwrap()
            .uses()
            .map(|(_, u)| u.span.start_line)
            .collect();
        assert_eq!(uses, vec![2, 3]);
    }

    #[test]
    fn rebase_keeps_fresh_delta() {
        let mut db = SymbolDatabase::new();
        let v1 = file("/a.cc", &[(300, true, &[1])]);
        index(&mut db, &v1);
        let v2 = file("/a.cc", &[(300, true, &[2])]);
        let fresh = diff(Some(&v1), Arc::clone(&v2));

        let current = db.snapshot(Path::new("/a.cc")).cloned();
        assert_eq!(db.rebase(fresh.clone(), current.as_ref()), fresh);
    }

    #[test]
    fn apply_records_include_edges() {
        let mut db = SymbolDatabase::new();
        let mut s = RemappedSnapshot::empty(PathBuf::from("/b.cc"), 1);
        s.dependencies.insert(PathBuf::from("/a.h"), Some(1));
        index(&mut db, &Arc::new(s));

        assert_eq!(db.includes().includers_of(Path::new("/a.h")), vec![PathBuf::from("/b.cc")]);
    }
}
