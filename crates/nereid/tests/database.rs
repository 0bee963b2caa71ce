//! Properties of delta application on the symbol database.

mod common;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{Fingerprint, called, caller, defined, fingerprint, index, record};
use nereid::delta::{CategoryDelta, DefUpdate, FileDelta, ListDelta, diff};
use nereid::snapshot::SymbolDef;
use nereid::{Category, Delta, DefInfo, RelationKind, RemappedSnapshot, Role, Span, StableId, SymbolDatabase, Use, stable_id};
use proptest::prelude::*;

// === Idempotence ===

#[test]
fn applying_a_delta_with_duplicate_uses_twice_changes_nothing() {
    let path = PathBuf::from("/proj/a.cc");
    let id = StableId(5000);
    let call = Use::new(Span::line(7, 3, 4), Role::CALL);

    let mut snapshot = RemappedSnapshot::empty(path.clone(), 1);
    snapshot.funcs.entry(id).or_default().uses.insert(call);

    let delta = Delta::from(FileDelta {
        path,
        snapshot: Some(Arc::new(snapshot)),
        types: CategoryDelta::default(),
        funcs: CategoryDelta {
            removed: Vec::new(),
            updates: vec![DefUpdate {
                id,
                info: None,
                declarations: ListDelta::default(),
                uses: ListDelta {
                    added: vec![call, call, call],
                    removed: Vec::new(),
                },
                relations: [(RelationKind::Callers, ListDelta {
                    added: vec![StableId(6000), StableId(6000)],
                    removed: Vec::new(),
                })]
                .into_iter()
                .collect(),
            }],
        },
        vars: CategoryDelta::default(),
    });

    let mut db = SymbolDatabase::new();
    db.apply(&delta);
    let once = fingerprint(&db);
    db.apply(&delta);

    assert_eq!(fingerprint(&db), once);
    assert_eq!(db.uses_of(id).len(), 1);
    assert_eq!(db.callers(id), vec![StableId(6000)]);
}

// === Provenance ===

fn header_defining_x() -> nereid::RawExtractionRecord {
    record(Path::new("/proj/a.h"), 1, &[], vec![defined(0, Category::Func, "c:@F@X#", 3)])
}

fn source_calling_x(calls: bool) -> nereid::RawExtractionRecord {
    let mut entries = vec![caller(0, "c:@F@main#", 1, if calls { &["c:@F@X#"] } else { &[] })];
    if calls {
        entries.push(called(1, "c:@F@X#", &[2]));
    }
    record(Path::new("/proj/b.cc"), 1, &[Path::new("/proj/a.h")], entries)
}

#[test]
fn dropping_a_reference_keeps_the_definition() {
    let x = stable_id("c:@F@X#");
    let mut db = SymbolDatabase::new();
    index(&mut db, &header_defining_x());
    index(&mut db, &source_calling_x(true));
    assert_eq!(db.def(x).map(nereid::db::Def::provenance), Some(2));

    index(&mut db, &source_calling_x(false));

    let def = db.def(x).expect("X should survive");
    assert_eq!(def.provenance(), 1);
    assert_eq!(db.definition_of(x).map(|l| l.path), Some(PathBuf::from("/proj/a.h")));
    assert!(db.uses_of(x).is_empty());
    assert!(db.callers(x).is_empty());
}

#[test]
fn removing_the_definer_keeps_referenced_symbol() {
    let x = stable_id("c:@F@X#");
    let mut db = SymbolDatabase::new();
    index(&mut db, &header_defining_x());
    index(&mut db, &source_calling_x(true));

    db.remove_file(Path::new("/proj/a.h")).expect("a.h was indexed");

    assert!(db.definition_of(x).is_none());
    assert_eq!(db.uses_of(x).len(), 1);
    assert_eq!(db.callers(x), vec![stable_id("c:@F@main#")]);

    db.remove_file(Path::new("/proj/b.cc")).expect("b.cc was indexed");
    assert!(db.def(x).is_none());
    assert_eq!(db.stats().funcs, 0);
}

// === Generated snapshots ===

/// (id, defines, use lines, callee)
type Item = (u64, bool, BTreeSet<u32>, Option<u64>);

fn build(path: &str, items: Vec<Item>) -> RemappedSnapshot {
    let mut snapshot = RemappedSnapshot::empty(PathBuf::from(path), 1);
    for (id, defines, lines, callee) in items {
        let def: &mut SymbolDef = snapshot.funcs.entry(StableId(1000 + id)).or_default();
        if defines {
            def.info = Some(DefInfo {
                detailed_name: format!("f{id}"),
                spell: Some(Span::line(1, 1, 2)),
                ..DefInfo::default()
            });
        }
        def.uses
            .extend(lines.into_iter().map(|line| Use::new(Span::line(line, 1, 2), Role::REFERENCE)));
        if let Some(callee) = callee {
            def.relate(RelationKind::Callees, StableId(1000 + callee));
        }
    }
    snapshot
}

fn arb_items() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(
        (
            0u64..6,
            any::<bool>(),
            prop::collection::btree_set(1u32..6, 0..3),
            prop::option::of(0u64..6),
        ),
        0..6,
    )
}

fn apply_sequence(db: &mut SymbolDatabase, snapshots: Vec<RemappedSnapshot>) {
    for snapshot in snapshots {
        let previous = db.snapshot(&snapshot.path).cloned();
        db.apply(&Delta::from(diff(previous.as_deref(), Arc::new(snapshot))));
    }
}

fn applied(delta: &Delta) -> Fingerprint {
    let mut db = SymbolDatabase::new();
    db.apply(delta);
    fingerprint(&db)
}

proptest! {
    #[test]
    fn apply_is_idempotent(before in arb_items(), after in arb_items()) {
        let mut db = SymbolDatabase::new();
        apply_sequence(&mut db, vec![build("/a.cc", before)]);
        let previous = db.snapshot(Path::new("/a.cc")).cloned();
        let delta = Delta::from(diff(previous.as_deref(), Arc::new(build("/a.cc", after))));

        db.apply(&delta);
        let once = fingerprint(&db);
        db.apply(&delta);

        prop_assert_eq!(fingerprint(&db), once);
    }

    #[test]
    fn sequential_deltas_converge_to_latest_snapshot(
        other in arb_items(),
        history in prop::collection::vec(arb_items(), 1..5),
    ) {
        let latest = history.last().cloned().unwrap_or_default();

        let mut incremental = SymbolDatabase::new();
        apply_sequence(&mut incremental, vec![build("/b.cc", other.clone())]);
        apply_sequence(
            &mut incremental,
            history.into_iter().map(|items| build("/a.cc", items)).collect(),
        );

        let mut direct = SymbolDatabase::new();
        apply_sequence(&mut direct, vec![build("/b.cc", other), build("/a.cc", latest)]);

        prop_assert_eq!(fingerprint(&incremental), fingerprint(&direct));
    }

    #[test]
    fn merge_is_associative(a in arb_items(), b in arb_items(), a2 in arb_items()) {
        let first = build("/a.cc", a);
        let d1 = Delta::from(diff(None, Arc::new(first.clone())));
        let d2 = Delta::from(diff(None, Arc::new(build("/b.cc", b))));
        let d3 = Delta::from(diff(Some(&first), Arc::new(build("/a.cc", a2))));

        let left = d1.clone().merge(d2.clone()).merge(d3.clone());
        let right = d1.merge(d2.merge(d3));

        prop_assert_eq!(applied(&left), applied(&right));
    }

    #[test]
    fn removal_leaves_only_other_files(a in arb_items(), b in arb_items()) {
        let mut db = SymbolDatabase::new();
        apply_sequence(&mut db, vec![build("/b.cc", b.clone())]);
        let expected = fingerprint(&db);

        apply_sequence(&mut db, vec![build("/a.cc", a)]);
        db.remove_file(Path::new("/a.cc"));

        prop_assert_eq!(fingerprint(&db), expected);
    }
}
