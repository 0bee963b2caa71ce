//! Remapped per-file snapshots.
//!
//! A [`RemappedSnapshot`] is everything one file contributes to the symbol
//! database, keyed by [`StableId`]. It is what the cache store persists, what
//! the delta builder diffs, and what the database keeps per file as the
//! baseline for the next diff.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::path::Timestamp;
use crate::types::{Category, DefInfo, RelationKind, Span, StableId, Use};

/// One file's view of one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolDef {
    /// Names and definition fields, absent for reference-only views
    pub info: Option<DefInfo>,
    /// Declaration locations in this file
    pub declarations: BTreeSet<Span>,
    /// Uses in this file
    pub uses: BTreeSet<Use>,
    /// Relationship lists contributed by this file
    pub relations: BTreeMap<RelationKind, BTreeSet<StableId>>,
}

impl SymbolDef {
    /// Add `target` to the `kind` relation list.
    pub fn relate(&mut self, kind: RelationKind, target: StableId) {
        self.relations.entry(kind).or_default().insert(target);
    }

    /// Targets of one relation list.
    pub fn related(&self, kind: RelationKind) -> impl Iterator<Item = StableId> + '_ {
        self.relations.get(&kind).into_iter().flatten().copied()
    }
}

/// A type as contributed by one file.
pub type TypeDef = SymbolDef;
/// A function as contributed by one file.
pub type FuncDef = SymbolDef;
/// A variable as contributed by one file.
pub type VarDef = SymbolDef;

/// A file's symbols after local indices were rewritten to [`StableId`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemappedSnapshot {
    /// Normalized path of the file
    pub path: PathBuf,
    /// Modification time the file had when it was analyzed
    pub last_modified: Timestamp,
    /// Compiler arguments of the translation unit
    pub args: Vec<String>,
    /// Direct includes and the modification time seen for each
    pub dependencies: BTreeMap<PathBuf, Option<Timestamp>>,
    /// Types by id
    pub types: BTreeMap<StableId, TypeDef>,
    /// Functions by id
    pub funcs: BTreeMap<StableId, FuncDef>,
    /// Variables by id
    pub vars: BTreeMap<StableId, VarDef>,
}

impl RemappedSnapshot {
    /// An empty snapshot for `path`.
    #[must_use]
    pub fn empty(path: PathBuf, last_modified: Timestamp) -> Self {
        Self {
            path,
            last_modified,
            args: Vec::new(),
            dependencies: BTreeMap::new(),
            types: BTreeMap::new(),
            funcs: BTreeMap::new(),
            vars: BTreeMap::new(),
        }
    }

    /// The map holding one category.
    #[must_use]
    pub fn category(&self, category: Category) -> &BTreeMap<StableId, SymbolDef> {
        match category {
            Category::Type => &self.types,
            Category::Func => &self.funcs,
            Category::Var => &self.vars,
        }
    }

    /// Mutable access to the map holding one category.
    pub fn category_mut(&mut self, category: Category) -> &mut BTreeMap<StableId, SymbolDef> {
        match category {
            Category::Type => &mut self.types,
            Category::Func => &mut self.funcs,
            Category::Var => &mut self.vars,
        }
    }

    /// The category `id` is stored under, if present.
    ///
    /// The unknown sentinel may appear under several categories; the first in
    /// [`Category::ALL`] order is returned.
    #[must_use]
    pub fn category_of(&self, id: StableId) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| self.category(*c).contains_key(&id))
    }

    /// Every `(category, id, def)` in the snapshot.
    pub fn iter(&self) -> impl Iterator<Item = (Category, StableId, &SymbolDef)> + '_ {
        Category::ALL.into_iter().flat_map(move |c| {
            self.category(c).iter().map(move |(id, def)| (c, *id, def))
        })
    }

    /// Total number of symbols across categories.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.types.len() + self.funcs.len() + self.vars.len()
    }
}
