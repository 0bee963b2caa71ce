//! The in-memory symbol database.
//!
//! ## Layout
//!
//! ```text
//! SymbolDatabase
//! ├── files          FileId -> FileRecord (latest snapshot per file)
//! ├── defs
//! │   ├── types      StableId -> Def
//! │   ├── funcs      StableId -> Def
//! │   └── vars       StableId -> Def
//! ├── usr_to_symbol  StableId -> Category
//! └── includes       IncludeGraph over file paths
//! ```
//!
//! Every [`Def`] keeps one [`SymbolDef`] per contributing file. Merged views
//! (all uses, the definition, relation lists) are computed from those
//! contributions on read, so retracting one file never disturbs what other
//! files said about the same symbol. A def's provenance count is the number
//! of files contributing to it; the def is deleted when it reaches zero.
//!
//! Relations are edges between [`StableId`]s, never references between defs,
//! so cycles (a calls b calls a) need no special handling.
//!
//! The only mutation entry points are [`SymbolDatabase::apply`] and
//! [`SymbolDatabase::remove_file`].

mod apply;
mod include_graph;
mod query;

pub use apply::ApplyStats;
pub use include_graph::IncludeGraph;
pub use query::{DatabaseStats, Location, OutlineItem, SymbolSummary, UseSite};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::remap::SymbolLookup;
use crate::snapshot::{RemappedSnapshot, SymbolDef};
use crate::types::{Category, DefInfo, FileId, RelationKind, Span, StableId, Use};

/// A symbol with the contributions of every file that mentions it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Def {
    id: StableId,
    category: Category,
    contributions: BTreeMap<FileId, SymbolDef>,
}

impl Def {
    fn new(id: StableId, category: Category) -> Self {
        Self {
            id,
            category,
            contributions: BTreeMap::new(),
        }
    }

    /// The symbol id.
    #[must_use]
    pub fn id(&self) -> StableId {
        self.id
    }

    /// The symbol category.
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Number of files contributing to this symbol.
    #[must_use]
    pub fn provenance(&self) -> usize {
        self.contributions.len()
    }

    /// Files contributing to this symbol.
    pub fn contributors(&self) -> impl Iterator<Item = FileId> + '_ {
        self.contributions.keys().copied()
    }

    /// What one file contributes.
    #[must_use]
    pub fn contribution(&self, file: FileId) -> Option<&SymbolDef> {
        self.contributions.get(&file)
    }

    /// The defining file and its definition fields.
    ///
    /// A reference-only or declaration-only contribution never shadows a
    /// definition. If several files define the symbol, the lowest file id wins.
    #[must_use]
    pub fn definition(&self) -> Option<(FileId, &DefInfo)> {
        self.contributions.iter().find_map(|(file, c)| {
            c.info
                .as_ref()
                .filter(|info| info.is_definition())
                .map(|info| (*file, info))
        })
    }

    /// Best available names: the definition's, else any declaration's.
    #[must_use]
    pub fn info(&self) -> Option<&DefInfo> {
        self.definition()
            .map(|(_, info)| info)
            .or_else(|| self.contributions.values().find_map(|c| c.info.as_ref()))
    }

    /// Display name, empty if no file provided one.
    #[must_use]
    pub fn name(&self) -> &str {
        self.info().map_or("", |info| info.detailed_name.as_str())
    }

    /// Every declaration, by file.
    pub fn declarations(&self) -> impl Iterator<Item = (FileId, Span)> + '_ {
        self.contributions
            .iter()
            .flat_map(|(file, c)| c.declarations.iter().map(move |span| (*file, *span)))
    }

    /// Every use, by file.
    pub fn uses(&self) -> impl Iterator<Item = (FileId, Use)> + '_ {
        self.contributions
            .iter()
            .flat_map(|(file, c)| c.uses.iter().map(move |u| (*file, *u)))
    }

    /// Union of one relation list over all contributions.
    #[must_use]
    pub fn related(&self, kind: RelationKind) -> BTreeSet<StableId> {
        self.contributions
            .values()
            .flat_map(|c| c.related(kind))
            .collect()
    }
}

/// A file the database has a snapshot for.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Interned id
    pub id: FileId,
    /// Normalized path
    pub path: PathBuf,
    /// What the file currently contributes; the baseline for its next diff
    pub snapshot: Arc<RemappedSnapshot>,
}

#[derive(Debug, Default, Clone)]
struct Defs {
    types: HashMap<StableId, Def>,
    funcs: HashMap<StableId, Def>,
    vars: HashMap<StableId, Def>,
}

impl Defs {
    fn get(&self, category: Category) -> &HashMap<StableId, Def> {
        match category {
            Category::Type => &self.types,
            Category::Func => &self.funcs,
            Category::Var => &self.vars,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut HashMap<StableId, Def> {
        match category {
            Category::Type => &mut self.types,
            Category::Func => &mut self.funcs,
            Category::Var => &mut self.vars,
        }
    }
}

/// Process-wide symbol store. See the module docs for the layout.
#[derive(Debug, Default, Clone)]
pub struct SymbolDatabase {
    paths: Vec<PathBuf>,
    file_ids: HashMap<PathBuf, FileId>,
    files: HashMap<FileId, FileRecord>,
    defs: Defs,
    usr_to_symbol: HashMap<StableId, Category>,
    includes: IncludeGraph,
}

impl SymbolDatabase {
    /// An empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interned id for `path`, assigning one if needed. Ids are never reused.
    fn intern(&mut self, path: &Path) -> FileId {
        if let Some(id) = self.file_ids.get(path) {
            return *id;
        }
        let id = FileId(u32::try_from(self.paths.len()).unwrap_or(u32::MAX));
        self.paths.push(path.to_path_buf());
        self.file_ids.insert(path.to_path_buf(), id);
        id
    }

    /// Interned id for `path`, if it was ever seen.
    #[must_use]
    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        self.file_ids.get(path).copied()
    }

    /// Path for an interned id.
    #[must_use]
    pub fn path_of(&self, file: FileId) -> Option<&Path> {
        usize::try_from(file.0)
            .ok()
            .and_then(|index| self.paths.get(index))
            .map(PathBuf::as_path)
    }

    /// The record for `path`, if the file is indexed.
    #[must_use]
    pub fn file(&self, path: &Path) -> Option<&FileRecord> {
        self.file_id(path).and_then(|id| self.files.get(&id))
    }

    /// The latest snapshot for `path`.
    #[must_use]
    pub fn snapshot(&self, path: &Path) -> Option<&Arc<RemappedSnapshot>> {
        self.file(path).map(|record| &record.snapshot)
    }

    /// Every indexed file.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> + '_ {
        self.files.values()
    }

    /// The def of `id` in `category`.
    #[must_use]
    pub fn def_in(&self, category: Category, id: StableId) -> Option<&Def> {
        self.defs.get(category).get(&id)
    }

    /// The def of `id`, dispatched through the id-to-category table.
    #[must_use]
    pub fn def(&self, id: StableId) -> Option<&Def> {
        self.usr_to_symbol
            .get(&id)
            .and_then(|category| self.def_in(*category, id))
    }

    /// All defs of one category.
    pub fn defs(&self, category: Category) -> impl Iterator<Item = &Def> + '_ {
        self.defs.get(category).values()
    }

    /// The include graph.
    #[must_use]
    pub fn includes(&self) -> &IncludeGraph {
        &self.includes
    }
}

impl SymbolLookup for SymbolDatabase {
    fn category_of(&self, id: StableId) -> Option<Category> {
        self.usr_to_symbol.get(&id).copied()
    }
}
