//! Delta construction.
//!
//! A [`FileDelta`] moves the database from reflecting one snapshot of a file
//! to reflecting the next: ids that disappeared are listed as removed, and
//! every id still present carries a [`DefUpdate`] whose list fields are
//! add/remove sub-lists against the previous content.
//!
//! A [`Delta`] is an ordered batch of file deltas. [`Delta::merge`]
//! concatenates, which makes merging associative and makes applying a merged
//! delta equal to applying its parts in order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::snapshot::{RemappedSnapshot, SymbolDef};
use crate::types::{Category, DefInfo, RelationKind, Span, StableId, Use};

/// Additions to and removals from one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDelta<T> {
    /// Elements to insert
    pub added: Vec<T>,
    /// Elements to remove
    pub removed: Vec<T>,
}

impl<T> Default for ListDelta<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T: Ord + Clone> ListDelta<T> {
    /// Set difference of `current` against `previous`.
    #[must_use]
    pub fn between(previous: &BTreeSet<T>, current: &BTreeSet<T>) -> Self {
        Self {
            added: current.difference(previous).cloned().collect(),
            removed: previous.difference(current).cloned().collect(),
        }
    }

    /// Apply to a set. Removals go first, so an element both removed and
    /// added ends up present.
    pub fn apply_to(&self, set: &mut BTreeSet<T>) {
        for item in &self.removed {
            set.remove(item);
        }
        set.extend(self.added.iter().cloned());
    }

    /// Whether this delta changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Field-level update for one id present in the new snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefUpdate {
    /// The symbol
    pub id: StableId,
    /// Names and definition fields as the file now sees them
    pub info: Option<DefInfo>,
    /// Declaration changes
    pub declarations: ListDelta<Span>,
    /// Use changes
    pub uses: ListDelta<Use>,
    /// Relation list changes; kinds with no change are omitted
    pub relations: BTreeMap<RelationKind, ListDelta<StableId>>,
}

impl DefUpdate {
    fn between(id: StableId, previous: Option<&SymbolDef>, current: &SymbolDef) -> Self {
        let empty = SymbolDef::default();
        let previous = previous.unwrap_or(&empty);
        let no_targets = BTreeSet::new();

        let kinds: BTreeSet<RelationKind> = previous
            .relations
            .keys()
            .chain(current.relations.keys())
            .copied()
            .collect();
        let relations = kinds
            .into_iter()
            .filter_map(|kind| {
                let before = previous.relations.get(&kind).unwrap_or(&no_targets);
                let after = current.relations.get(&kind).unwrap_or(&no_targets);
                let delta = ListDelta::between(before, after);
                (!delta.is_empty()).then_some((kind, delta))
            })
            .collect();

        Self {
            id,
            info: current.info.clone(),
            declarations: ListDelta::between(&previous.declarations, &current.declarations),
            uses: ListDelta::between(&previous.uses, &current.uses),
            relations,
        }
    }
}

/// Changes to one category of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDelta {
    /// Ids the file no longer contributes to
    pub removed: Vec<StableId>,
    /// Ids the file contributes to now
    pub updates: Vec<DefUpdate>,
}

impl CategoryDelta {
    fn between(
        previous: Option<&BTreeMap<StableId, SymbolDef>>,
        current: &BTreeMap<StableId, SymbolDef>,
    ) -> Self {
        let removed = previous
            .into_iter()
            .flat_map(BTreeMap::keys)
            .filter(|id| !current.contains_key(*id))
            .copied()
            .collect();
        let updates = current
            .iter()
            .map(|(id, def)| DefUpdate::between(*id, previous.and_then(|p| p.get(id)), def))
            .collect();
        Self { removed, updates }
    }

    fn removal(previous: &BTreeMap<StableId, SymbolDef>) -> Self {
        Self {
            removed: previous.keys().copied().collect(),
            updates: Vec::new(),
        }
    }

    /// Whether this category is untouched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.updates.is_empty()
    }
}

/// Changes one file makes to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDelta {
    /// Normalized path of the file
    pub path: PathBuf,
    /// Snapshot the database records for the file once applied; `None`
    /// removes the file
    pub snapshot: Option<Arc<RemappedSnapshot>>,
    /// Type changes
    pub types: CategoryDelta,
    /// Function changes
    pub funcs: CategoryDelta,
    /// Variable changes
    pub vars: CategoryDelta,
}

impl FileDelta {
    /// The changes for one category.
    #[must_use]
    pub fn category(&self, category: Category) -> &CategoryDelta {
        match category {
            Category::Type => &self.types,
            Category::Func => &self.funcs,
            Category::Var => &self.vars,
        }
    }

    /// Whether this delta removes the file.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.snapshot.is_none()
    }

    /// Number of removed ids plus updated ids.
    #[must_use]
    pub fn len(&self) -> usize {
        Category::ALL
            .iter()
            .map(|c| {
                let d = self.category(*c);
                d.removed.len() + d.updates.len()
            })
            .sum()
    }

    /// Whether the delta carries no per-id changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered batch of file deltas, applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// File deltas in application order
    pub files: Vec<FileDelta>,
}

impl Delta {
    /// Merge two deltas. Applying the result equals applying `self` then `other`.
    #[must_use]
    pub fn merge(mut self, other: Delta) -> Self {
        self.files.extend(other.files);
        self
    }

    /// Append one file delta.
    pub fn push(&mut self, file: FileDelta) {
        self.files.push(file);
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl From<FileDelta> for Delta {
    fn from(file: FileDelta) -> Self {
        Self { files: vec![file] }
    }
}

/// Compute the delta from `previous` to `current`.
///
/// With no previous snapshot the delta is purely additive.
#[must_use]
pub fn diff(previous: Option<&RemappedSnapshot>, current: Arc<RemappedSnapshot>) -> FileDelta {
    let types = CategoryDelta::between(previous.map(|p| &p.types), &current.types);
    let funcs = CategoryDelta::between(previous.map(|p| &p.funcs), &current.funcs);
    let vars = CategoryDelta::between(previous.map(|p| &p.vars), &current.vars);
    FileDelta {
        path: current.path.clone(),
        snapshot: Some(current),
        types,
        funcs,
        vars,
    }
}

/// A delta that retracts everything `previous` contributed and forgets the file.
#[must_use]
pub fn removal(previous: &RemappedSnapshot) -> FileDelta {
    FileDelta {
        path: previous.path.clone(),
        snapshot: None,
        types: CategoryDelta::removal(&previous.types),
        funcs: CategoryDelta::removal(&previous.funcs),
        vars: CategoryDelta::removal(&previous.vars),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn snapshot(funcs: &[(u64, &[u32])]) -> RemappedSnapshot {
        let mut s = RemappedSnapshot::empty(PathBuf::from("/a.cc"), 1);
        for (id, lines) in funcs {
            let def = s.funcs.entry(StableId(*id)).or_default();
            for line in *lines {
                def.uses.insert(Use::new(Span::line(*line, 1, 2), Role::CALL));
            }
        }
        s
    }

    #[test]
    fn no_previous_is_purely_additive() {
        let delta = diff(None, Arc::new(snapshot(&[(300, &[1, 2]), (400, &[])])));

        assert!(delta.funcs.removed.is_empty());
        assert_eq!(delta.funcs.updates.len(), 2);
        assert_eq!(delta.funcs.updates[0].uses.added.len(), 2);
        assert!(delta.funcs.updates[0].uses.removed.is_empty());
    }

    #[test]
    fn vanished_ids_are_removed_and_lists_diffed() {
        let before = snapshot(&[(300, &[1, 2]), (400, &[3])]);
        let after = snapshot(&[(300, &[2, 5])]);

        let delta = diff(Some(&before), Arc::new(after));

        assert_eq!(delta.funcs.removed, vec![StableId(400)]);
        let update = &delta.funcs.updates[0];
        assert_eq!(update.id, StableId(300));
        assert_eq!(update.uses.added, vec![Use::new(Span::line(5, 1, 2), Role::CALL)]);
        assert_eq!(update.uses.removed, vec![Use::new(Span::line(1, 1, 2), Role::CALL)]);
    }

    #[test]
    fn unchanged_ids_still_get_an_update() {
        let before = snapshot(&[(300, &[1])]);
        let delta = diff(Some(&before), Arc::new(before.clone()));

        assert_eq!(delta.funcs.updates.len(), 1);
        assert!(delta.funcs.updates[0].uses.is_empty());
        assert!(delta.funcs.updates[0].relations.is_empty());
    }

    #[test]
    fn relation_changes_only_list_touched_kinds() {
        let mut before = snapshot(&[(300, &[])]);
        before.funcs.get_mut(&StableId(300)).unwrap().relate(RelationKind::Callees, StableId(500));
        let mut after = before.clone();
        let def = after.funcs.get_mut(&StableId(300)).unwrap();
        def.relations.clear();
        def.relate(RelationKind::Bases, StableId(600));

        let delta = diff(Some(&before), Arc::new(after));

        let relations = &delta.funcs.updates[0].relations;
        assert_eq!(relations[&RelationKind::Callees].removed, vec![StableId(500)]);
        assert_eq!(relations[&RelationKind::Bases].added, vec![StableId(600)]);
    }

    #[test]
    fn removal_lists_every_id_and_drops_snapshot() {
        let before = snapshot(&[(300, &[1]), (400, &[])]);
        let delta = removal(&before);

        assert!(delta.is_removal());
        assert_eq!(delta.funcs.removed.len(), 2);
        assert!(delta.funcs.updates.is_empty());
    }

    #[test]
    fn list_delta_apply_reproduces_current() {
        let previous: BTreeSet<u32> = [1, 2, 3].into();
        let current: BTreeSet<u32> = [2, 3, 4].into();

        let mut set = previous.clone();
        ListDelta::between(&previous, &current).apply_to(&mut set);

        assert_eq!(set, current);
    }

    #[test]
    fn merge_concatenates_in_order() {
        let a = Delta::from(diff(None, Arc::new(snapshot(&[(300, &[])]))));
        let b = Delta::from(removal(&snapshot(&[(300, &[])])));

        let merged = a.clone().merge(b.clone());

        assert_eq!(merged.files.len(), 2);
        assert_eq!(merged.files[0], a.files[0]);
        assert_eq!(merged.files[1], b.files[0]);
    }
}
