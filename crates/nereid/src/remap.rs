//! Rewrites record-local indices into [`StableId`]s.
//!
//! ## Algorithm
//!
//! 1. Pre-scan every entry and map its [`LocalIndex`] to the hash of its
//!    signature, so forward references resolve.
//! 2. For each entry, build its [`SymbolDef`]: names and definition fields,
//!    declarations, uses and outgoing relations (`bases`, `callees`).
//! 3. Record the reverse edges (`derived`, `callers`, `members`, `instances`)
//!    on the target's entry in the same snapshot. A target defined elsewhere
//!    gets a reference-only entry here, which is how a file contributes to a
//!    symbol it does not define.
//!
//! Anomalies degrade per entry and are counted in [`RemapStats`]:
//!
//! | Anomaly | Handling |
//! |---------|----------|
//! | empty signature | uses kept under [`StableId::UNKNOWN`], everything else dropped |
//! | dangling local reference | reference dropped |
//! | unknown builtin spelling | reference dropped |
//! | id already used by another category in this record | entry dropped |

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::extract::{LocalIndex, RawEntry, RawExtractionRecord, RawRef};
use crate::path::normalize;
use crate::snapshot::{RemappedSnapshot, SymbolDef};
use crate::stable_id::{builtin_id, stable_id};
use crate::types::{Category, DefInfo, RelationKind, StableId};

/// Read-only view of the database's id-to-category table.
pub trait SymbolLookup {
    /// Category `id` is stored under, if the database knows it.
    fn category_of(&self, id: StableId) -> Option<Category>;
}

impl SymbolLookup for HashMap<StableId, Category> {
    fn category_of(&self, id: StableId) -> Option<Category> {
        self.get(&id).copied()
    }
}

/// Counters describing one remap.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemapStats {
    /// Entries read from the record
    pub entries: usize,
    /// Ids the database did not know yet
    pub new_symbols: usize,
    /// Ids the database knows under a different category
    pub category_mismatches: usize,
    /// Entries without a usable signature
    pub unknown_signatures: usize,
    /// Local references with no matching entry
    pub dangling_refs: usize,
    /// Builtin references with an unrecognized spelling
    pub unresolved_builtins: usize,
    /// Entries dropped because their id was already used by another category
    pub category_conflicts: usize,
}

/// Remap one record against the database's symbol table.
#[must_use]
pub fn remap(record: &RawExtractionRecord, lookup: &dyn SymbolLookup) -> (RemappedSnapshot, RemapStats) {
    let mut stats = RemapStats {
        entries: record.entries.len(),
        ..RemapStats::default()
    };

    let locals: HashMap<LocalIndex, StableId> = record
        .entries
        .iter()
        .map(|entry| (entry.index, stable_id(&entry.usr)))
        .collect();

    // First category seen for an id wins, both for entries and reverse edges.
    let mut claimed: HashMap<StableId, Category> = HashMap::new();
    for entry in &record.entries {
        let id = stable_id(&entry.usr);
        if id.is_unknown() || claimed.contains_key(&id) {
            continue;
        }
        claimed.insert(id, entry.category);
        match lookup.category_of(id) {
            None => stats.new_symbols += 1,
            Some(known) if known != entry.category => stats.category_mismatches += 1,
            Some(_) => {}
        }
    }

    let mut snapshot = RemappedSnapshot::empty(normalize(&record.path), record.last_modified);
    snapshot.args.clone_from(&record.args);
    snapshot.dependencies = record
        .dependencies
        .iter()
        .map(|dep| (normalize(&dep.path), dep.last_modified))
        .collect();

    for entry in &record.entries {
        let id = stable_id(&entry.usr);
        if id.is_unknown() {
            stats.unknown_signatures += 1;
            trace!(file = %record.path.display(), index = entry.index.0, "Entry has no signature");
            snapshot
                .category_mut(entry.category)
                .entry(StableId::UNKNOWN)
                .or_default()
                .uses
                .extend(entry.uses.iter().copied());
            continue;
        }

        if let Some(kept) = claimed.get(&id).filter(|c| **c != entry.category) {
            stats.category_conflicts += 1;
            debug!(
                file = %record.path.display(),
                usr = %entry.usr,
                kept = %kept,
                dropped = %entry.category,
                "Signature used by two categories in one record"
            );
            continue;
        }

        let mut resolve = |reference: &RawRef| resolve_ref(reference, &locals, &mut stats);
        let declaring_type = entry.declaring_type.as_ref().and_then(&mut resolve);
        let value_type = entry.value_type.as_ref().and_then(&mut resolve);
        let bases: Vec<StableId> = entry.bases.iter().filter_map(&mut resolve).collect();
        let callees: Vec<StableId> = entry.callees.iter().filter_map(&mut resolve).collect();

        let def = snapshot.category_mut(entry.category).entry(id).or_default();
        merge_info(def, entry, declaring_type, value_type);
        def.declarations.extend(entry.declarations.iter().copied());
        def.uses.extend(entry.uses.iter().copied());
        for base in &bases {
            def.relate(RelationKind::Bases, *base);
        }
        for callee in &callees {
            def.relate(RelationKind::Callees, *callee);
        }

        let mut reverse = |category, target, kind| {
            reverse_edge(&mut snapshot, &claimed, category, target, kind, id);
        };
        for base in bases {
            reverse(entry.category, base, RelationKind::Derived);
        }
        for callee in callees {
            reverse(Category::Func, callee, RelationKind::Callers);
        }
        if let Some(owner) = declaring_type {
            reverse(Category::Type, owner, RelationKind::Members);
        }
        if let (Category::Var, Some(ty)) = (entry.category, value_type) {
            reverse(Category::Type, ty, RelationKind::Instances);
        }
    }

    (snapshot, stats)
}

fn resolve_ref(
    reference: &RawRef,
    locals: &HashMap<LocalIndex, StableId>,
    stats: &mut RemapStats,
) -> Option<StableId> {
    let id = match reference {
        RawRef::Local(index) => {
            let Some(id) = locals.get(index) else {
                stats.dangling_refs += 1;
                return None;
            };
            *id
        }
        RawRef::External(usr) => stable_id(usr),
        RawRef::Builtin(name) => {
            let Some(id) = builtin_id(name) else {
                stats.unresolved_builtins += 1;
                return None;
            };
            id
        }
    };
    (!id.is_unknown()).then_some(id)
}

/// Several raw entries may describe one symbol (e.g. a declaration and a
/// definition). The definition-bearing one wins; names fill in otherwise.
fn merge_info(
    def: &mut SymbolDef,
    entry: &RawEntry,
    declaring_type: Option<StableId>,
    value_type: Option<StableId>,
) {
    let incoming = DefInfo {
        detailed_name: entry.detailed_name.clone(),
        short_name_offset: entry.short_name_offset,
        short_name_len: entry.short_name_len,
        spell: entry.definition.map(|d| d.spell),
        extent: entry.definition.map(|d| d.extent),
        storage: entry.storage,
        declaring_type,
        value_type,
    };

    match &mut def.info {
        None => def.info = Some(incoming),
        Some(existing) if !existing.is_definition() && incoming.is_definition() => {
            *existing = incoming;
        }
        Some(existing) => {
            if existing.detailed_name.is_empty() {
                existing.detailed_name = incoming.detailed_name;
                existing.short_name_offset = incoming.short_name_offset;
                existing.short_name_len = incoming.short_name_len;
            }
            existing.declaring_type = existing.declaring_type.or(incoming.declaring_type);
            existing.value_type = existing.value_type.or(incoming.value_type);
        }
    }
}

/// Builtin targets are shared by the whole project; reverse edges onto them
/// would grow without bound and are not recorded. Neither are edges onto an
/// id this record already files under another category.
fn reverse_edge(
    snapshot: &mut RemappedSnapshot,
    claimed: &HashMap<StableId, Category>,
    category: Category,
    target: StableId,
    kind: RelationKind,
    source: StableId,
) {
    if target.is_builtin() || claimed.get(&target).is_some_and(|c| *c != category) {
        return;
    }
    snapshot
        .category_mut(category)
        .entry(target)
        .or_default()
        .relate(kind, source);
}
