//! Read-only queries.
//!
//! Results are plain owned values so callers can drop the read lock before
//! formatting them.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{Def, SymbolDatabase};
use crate::types::{Category, RelationKind, Role, Span, StableId};

/// A span in a named file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    /// File path
    pub path: PathBuf,
    /// Range within the file
    pub span: Span,
}

/// One use of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UseSite {
    /// File path
    pub path: PathBuf,
    /// Range within the file
    pub span: Span,
    /// Role bitmask
    pub role: Role,
}

/// A symbol as listed by file and search queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolSummary {
    /// Symbol id
    pub id: StableId,
    /// Symbol category
    pub category: Category,
    /// Detailed name, empty if unknown
    pub name: String,
    /// Definition location, if any file defines it
    pub definition: Option<Location>,
}

/// One entry of a file outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineItem {
    /// Symbol id
    pub id: StableId,
    /// Symbol category
    pub category: Category,
    /// Detailed name as this file sees it
    pub name: String,
    /// Definition extent, or the declaration span
    pub span: Span,
    /// Whether `span` is a definition
    pub is_definition: bool,
}

/// Size of the database.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    /// Indexed files
    pub files: usize,
    /// Type defs
    pub types: usize,
    /// Function defs
    pub funcs: usize,
    /// Variable defs
    pub vars: usize,
    /// Uses across all defs
    pub uses: usize,
    /// Include edges
    pub include_edges: usize,
}

impl SymbolDatabase {
    fn location(&self, file: crate::types::FileId, span: Span) -> Option<Location> {
        self.path_of(file).map(|path| Location {
            path: path.to_path_buf(),
            span,
        })
    }

    fn summary(&self, def: &Def) -> SymbolSummary {
        SymbolSummary {
            id: def.id(),
            category: def.category(),
            name: def.name().to_string(),
            definition: self.definition_of(def.id()),
        }
    }

    /// The category `id` is stored under.
    #[must_use]
    pub fn category_of(&self, id: StableId) -> Option<Category> {
        self.usr_to_symbol.get(&id).copied()
    }

    /// Symbols declared or defined in `path`, ordered by category then id.
    #[must_use]
    pub fn symbols_in_file(&self, path: &Path) -> Vec<SymbolSummary> {
        let Some(record) = self.file(path) else {
            return Vec::new();
        };
        record
            .snapshot
            .iter()
            .filter(|(_, id, def)| {
                !id.is_unknown()
                    && (!def.declarations.is_empty()
                        || def.info.as_ref().is_some_and(|info| info.is_definition()))
            })
            .filter_map(|(category, id, _)| self.def_in(category, id))
            .map(|def| self.summary(def))
            .collect()
    }

    /// Definitions and declarations in `path`, in source order.
    #[must_use]
    pub fn outline(&self, path: &Path) -> Vec<OutlineItem> {
        let Some(record) = self.file(path) else {
            return Vec::new();
        };
        let mut items = Vec::new();
        for (category, id, def) in record.snapshot.iter() {
            if id.is_unknown() {
                continue;
            }
            let name = def
                .info
                .as_ref()
                .map(|info| info.detailed_name.clone())
                .unwrap_or_default();
            if let Some(extent) = def.info.as_ref().and_then(|info| info.extent) {
                items.push(OutlineItem {
                    id,
                    category,
                    name: name.clone(),
                    span: extent,
                    is_definition: true,
                });
            }
            items.extend(def.declarations.iter().map(|span| OutlineItem {
                id,
                category,
                name: name.clone(),
                span: *span,
                is_definition: false,
            }));
        }
        items.sort_by(|a, b| a.span.cmp(&b.span).then_with(|| b.is_definition.cmp(&a.is_definition)));
        items
    }

    /// Every use of `id` across all files, sorted by location.
    #[must_use]
    pub fn uses_of(&self, id: StableId) -> Vec<UseSite> {
        let Some(def) = self.def(id) else {
            return Vec::new();
        };
        let mut uses: Vec<UseSite> = def
            .uses()
            .filter_map(|(file, u)| {
                self.path_of(file).map(|path| UseSite {
                    path: path.to_path_buf(),
                    span: u.span,
                    role: u.role,
                })
            })
            .collect();
        uses.sort();
        uses
    }

    /// Uses of `id` having every bit of `role`.
    #[must_use]
    pub fn uses_with_role(&self, id: StableId, role: Role) -> Vec<UseSite> {
        let mut uses = self.uses_of(id);
        uses.retain(|u| u.role.contains(role));
        uses
    }

    /// Where `id` is defined.
    #[must_use]
    pub fn definition_of(&self, id: StableId) -> Option<Location> {
        let (file, info) = self.def(id)?.definition()?;
        self.location(file, info.spell?)
    }

    /// Every declaration of `id`, sorted.
    #[must_use]
    pub fn declarations_of(&self, id: StableId) -> Vec<Location> {
        let Some(def) = self.def(id) else {
            return Vec::new();
        };
        let mut declarations: Vec<Location> = def
            .declarations()
            .filter_map(|(file, span)| self.location(file, span))
            .collect();
        declarations.sort();
        declarations
    }

    /// Targets of one relation list of `id`.
    #[must_use]
    pub fn related(&self, id: StableId, kind: RelationKind) -> Vec<StableId> {
        self.def(id)
            .map(|def| def.related(kind).into_iter().collect())
            .unwrap_or_default()
    }

    /// Functions that call `id`.
    #[must_use]
    pub fn callers(&self, id: StableId) -> Vec<StableId> {
        self.related(id, RelationKind::Callers)
    }

    /// Functions `id` calls.
    #[must_use]
    pub fn callees(&self, id: StableId) -> Vec<StableId> {
        self.related(id, RelationKind::Callees)
    }

    /// Bases of a type, or methods a function overrides.
    #[must_use]
    pub fn bases(&self, id: StableId) -> Vec<StableId> {
        self.related(id, RelationKind::Bases)
    }

    /// Types deriving from `id`, or overriders of a method.
    #[must_use]
    pub fn derived(&self, id: StableId) -> Vec<StableId> {
        self.related(id, RelationKind::Derived)
    }

    /// Members of a type.
    #[must_use]
    pub fn members(&self, id: StableId) -> Vec<StableId> {
        self.related(id, RelationKind::Members)
    }

    /// Variables declared with type `id`.
    #[must_use]
    pub fn instances(&self, id: StableId) -> Vec<StableId> {
        self.related(id, RelationKind::Instances)
    }

    /// Case-insensitive substring search over detailed names.
    ///
    /// Scans every def; intended for interactive symbol search, not hot paths.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<SymbolSummary> {
        let needle = query.to_lowercase();
        let mut hits: Vec<&Def> = Category::ALL
            .into_iter()
            .flat_map(|c| self.defs(c))
            .filter(|def| !def.name().is_empty() && def.name().to_lowercase().contains(&needle))
            .collect();
        hits.sort_by(|a, b| a.name().len().cmp(&b.name().len()).then_with(|| a.name().cmp(b.name())));
        hits.into_iter().take(limit).map(|def| self.summary(def)).collect()
    }

    /// Files that include `path`, directly or transitively.
    #[must_use]
    pub fn dependents(&self, path: &Path) -> Vec<PathBuf> {
        self.includes.includers_of(path)
    }

    /// Counts of files, defs, uses and include edges.
    #[must_use]
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            files: self.files.len(),
            types: self.defs.types.len(),
            funcs: self.defs.funcs.len(),
            vars: self.defs.vars.len(),
            uses: Category::ALL
                .into_iter()
                .flat_map(|c| self.defs(c))
                .map(|def| def.uses().count())
                .sum(),
            include_edges: self.includes.edge_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{Delta, diff};
    use crate::snapshot::RemappedSnapshot;
    use crate::types::{DefInfo, Use};
    use std::sync::Arc;

    fn db_with_two_files() -> SymbolDatabase {
        let f = StableId(1000);
        let g = StableId(2000);

        let mut header = RemappedSnapshot::empty(PathBuf::from("/a.h"), 1);
        let def = header.funcs.entry(f).or_default();
        def.info = Some(DefInfo {
            detailed_name: "void F()".to_string(),
            short_name_offset: 5,
            short_name_len: 1,
            spell: Some(Span::line(1, 6, 7)),
            extent: Some(Span::line(1, 1, 12)),
            ..DefInfo::default()
        });
        def.declarations.insert(Span::line(1, 6, 7));

        let mut source = RemappedSnapshot::empty(PathBuf::from("/b.cc"), 1);
        source.dependencies.insert(PathBuf::from("/a.h"), Some(1));
        let caller = source.funcs.entry(g).or_default();
        caller.info = Some(DefInfo {
            detailed_name: "void G()".to_string(),
            spell: Some(Span::line(2, 6, 7)),
            ..DefInfo::default()
        });
        caller.relate(RelationKind::Callees, f);
        let callee = source.funcs.entry(f).or_default();
        callee.uses.insert(Use::new(Span::line(3, 3, 4), Role::CALL | Role::REFERENCE));
        callee.relate(RelationKind::Callers, g);

        let mut db = SymbolDatabase::new();
        db.apply(&Delta::from(diff(None, Arc::new(header))));
        db.apply(&Delta::from(diff(None, Arc::new(source))));
        db
    }

    #[test]
    fn definition_and_uses_come_from_different_files() {
        let db = db_with_two_files();

        let definition = db.definition_of(StableId(1000)).unwrap();
        assert_eq!(definition.path, PathBuf::from("/a.h"));

        let uses = db.uses_of(StableId(1000));
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].path, PathBuf::from("/b.cc"));
        assert!(uses[0].role.contains(Role::CALL));
    }

    #[test]
    fn call_graph_in_both_directions() {
        let db = db_with_two_files();

        assert_eq!(db.callers(StableId(1000)), vec![StableId(2000)]);
        assert_eq!(db.callees(StableId(2000)), vec![StableId(1000)]);
    }

    #[test]
    fn symbols_in_file_lists_declared_symbols_only() {
        let db = db_with_two_files();

        let in_source: Vec<StableId> = db.symbols_in_file(Path::new("/b.cc")).iter().map(|s| s.id).collect();
        assert_eq!(in_source, vec![StableId(2000)]);

        let in_header = db.symbols_in_file(Path::new("/a.h"));
        assert_eq!(in_header.len(), 1);
        assert_eq!(in_header[0].name, "void F()");
    }

    #[test]
    fn outline_lists_extents_and_declarations_in_order() {
        let db = db_with_two_files();

        let outline = db.outline(Path::new("/a.h"));
        assert_eq!(outline.len(), 2);
        assert!(outline[0].is_definition);
        assert_eq!(outline[0].span, Span::line(1, 1, 12));
        assert!(!outline[1].is_definition);
        assert_eq!(outline[1].name, "void F()");
        assert!(db.outline(Path::new("/nope.cc")).is_empty());
    }

    #[test]
    fn search_is_case_insensitive() {
        let db = db_with_two_files();

        let hits = db.search("void f", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, StableId(1000));
        assert!(db.search("zzz", 10).is_empty());
    }

    #[test]
    fn stats_and_dependents() {
        let db = db_with_two_files();

        let stats = db.stats();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.funcs, 2);
        assert_eq!(stats.uses, 1);
        assert_eq!(stats.include_edges, 1);
        assert_eq!(db.dependents(Path::new("/a.h")), vec![PathBuf::from("/b.cc")]);
    }

    #[test]
    fn uses_with_role_filters() {
        let db = db_with_two_files();

        assert_eq!(db.uses_with_role(StableId(1000), Role::CALL).len(), 1);
        assert!(db.uses_with_role(StableId(1000), Role::WRITE).is_empty());
    }

    #[test]
    fn unknown_ids_yield_empty_results() {
        let db = db_with_two_files();

        assert!(db.uses_of(StableId(9)).is_empty());
        assert!(db.definition_of(StableId(9)).is_none());
        assert!(db.declarations_of(StableId(9)).is_empty());
    }
}
