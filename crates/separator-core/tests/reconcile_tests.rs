//! Reconciliation tests
//!
//! Edits go to the loaded set first and to the store second; these tests
//! check the two counts and the divergence report.

mod helpers;

use helpers::*;
use separator_core::{
    EditTarget, FilterCriteria, Reconciler, Record, RecordChanges, RecordEdit, RecordSet,
    SaveControl,
};

fn now() -> chrono::NaiveDateTime {
    at(2024, 3, 12, 12)
}

#[tokio::test]
async fn test_edits_confirmed_in_store() {
    let (gateway, store) = memory_gateway();
    store.seed(&table(), &[record("ORD-1", "Ana", 1), record("ORD-2", "Ana", 2)]);
    let mut set = gateway.load_all().await.unwrap();
    let id = set.original()[0].id.unwrap();

    let report = Reconciler::new(&gateway)
        .apply_edits(
            &mut set,
            &[RecordEdit::stored(id, RecordChanges::new().analysis(true))],
            now(),
        )
        .await
        .unwrap();

    assert_eq!(report.updated_in_memory, 1);
    assert_eq!(report.confirmed_in_store, 1);
    assert!(!report.diverged());
    assert!(set.find_by_id(id).unwrap().analysis);
    assert!(store.snapshot(&table()).iter().any(|r| r.id == Some(id) && r.analysis));
}

#[tokio::test]
async fn test_local_only_records_change_in_memory_only() {
    let (gateway, store) = memory_gateway();
    let mut set = RecordSet::unfiltered(vec![record("NEW-1", "Beto", 3)]);

    let report = Reconciler::new(&gateway)
        .apply_edits(
            &mut set,
            &[RecordEdit::local(0, RecordChanges::new().separator_name("Beatriz"))],
            now(),
        )
        .await
        .unwrap();

    assert_eq!(report.updated_in_memory, 1);
    assert_eq!(report.local_only, 1);
    assert_eq!(report.confirmed_in_store, 0);
    assert!(!report.diverged());
    assert_eq!(set.original()[0].separator_name, "Beatriz");
    assert_eq!(store.connections_opened(), 0);
}

#[tokio::test]
async fn test_store_failure_is_reported_as_divergence() {
    let (gateway, store) = faulty_gateway(Faults {
        fail_update_ids: vec![2],
        ..Faults::default()
    });
    store.seed(&table(), &[record("ORD-1", "Caio", 1), record("ORD-2", "Caio", 2)]);
    let mut set = gateway.load_all().await.unwrap();

    let edits = [
        RecordEdit::stored(1, RecordChanges::new().separator_name("Caio Lima")),
        RecordEdit::stored(2, RecordChanges::new().separator_name("Caio Lima")),
    ];
    let report = Reconciler::new(&gateway)
        .apply_edits(&mut set, &edits, now())
        .await
        .unwrap();

    assert_eq!(report.updated_in_memory, 2);
    assert_eq!(report.confirmed_in_store, 1);
    assert!(report.diverged());
    assert_eq!(report.store_failures.len(), 1);
    assert_eq!(report.store_failures[0].id, 2);
    assert_eq!(report.store_failures[0].kind, "connection");

    // The local change stays even though the store rejected it
    assert_eq!(set.find_by_id(2).unwrap().separator_name, "Caio Lima");
    let stored = store.snapshot(&table());
    assert_eq!(stored.iter().find(|r| r.id == Some(2)).unwrap().separator_name, "Caio");
}

#[tokio::test]
async fn test_record_deleted_elsewhere_is_a_store_miss() {
    let (gateway, store) = memory_gateway();
    store.seed(&table(), &[record("ORD-1", "Duda", 1)]);
    let mut set = gateway.load_all().await.unwrap();
    gateway.delete(1).await.unwrap();

    let report = Reconciler::new(&gateway)
        .apply_edits(
            &mut set,
            &[RecordEdit::stored(1, RecordChanges::new().analysis(true))],
            now(),
        )
        .await
        .unwrap();

    assert_eq!(report.store_misses, vec![1]);
    assert!(report.diverged());
}

#[tokio::test]
async fn test_unknown_targets_are_listed() {
    let (gateway, _store) = memory_gateway();
    let mut set = RecordSet::empty();

    let report = Reconciler::new(&gateway)
        .apply_edits(
            &mut set,
            &[
                RecordEdit::stored(5, RecordChanges::new().analysis(true)),
                RecordEdit::local(3, RecordChanges::new().analysis(true)),
            ],
            now(),
        )
        .await
        .unwrap();

    assert_eq!(report.not_found, vec![EditTarget::Stored(5), EditTarget::Local(3)]);
    assert_eq!(report.updated_in_memory, 0);
}

#[tokio::test]
async fn test_invalid_edit_changes_nothing() {
    let (gateway, store) = memory_gateway();
    store.seed(&table(), &[record("ORD-1", "Eli", 1)]);
    let mut set = gateway.load_all().await.unwrap();
    let before = set.clone();

    let err = Reconciler::new(&gateway)
        .apply_edits(
            &mut set,
            &[
                RecordEdit::stored(1, RecordChanges::new().analysis(true)),
                RecordEdit::stored(1, RecordChanges::new().order_number("")),
            ],
            now(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "validation");
    assert_eq!(set, before);
}

#[tokio::test]
async fn test_view_follows_active_criteria_after_edit() {
    let (gateway, store) = memory_gateway();
    store.seed(&table(), &[record("ORD-1", "Fe", 1), record("ORD-2", "Fe", 2)]);
    let mut set = gateway.load_all().await.unwrap();
    set.apply_filters(FilterCriteria::new().analysis_only(true));
    assert!(set.filtered().is_empty());

    Reconciler::new(&gateway)
        .apply_edits(
            &mut set,
            &[RecordEdit::stored(2, RecordChanges::new().analysis(true))],
            now(),
        )
        .await
        .unwrap();

    assert_eq!(set.filtered().len(), 1);
    assert_eq!(set.filtered()[0].id, Some(2));
}

#[tokio::test]
async fn test_persist_new_assigns_ids_in_set() {
    let (gateway, _store) = memory_gateway();
    let mut set = RecordSet::unfiltered(batch_with_duplicate());

    let report = Reconciler::new(&gateway)
        .persist_new(&mut set, SaveControl::new(), now())
        .await
        .unwrap();

    assert_eq!(report.saved, 9);
    assert_eq!(set.original().iter().filter(|r| r.id.is_some()).count(), 9);
    assert!(set.original()[4].is_local_only());
}

#[tokio::test]
async fn test_delete_drops_local_copy() {
    let (gateway, store) = memory_gateway();
    store.seed(&table(), &[record("ORD-1", "Gui", 1)]);
    let mut set = gateway.load_all().await.unwrap();

    assert!(Reconciler::new(&gateway).delete(&mut set, 1, now()).await.unwrap());
    assert!(set.is_empty());
    assert!(store.snapshot(&table()).is_empty());
}

#[tokio::test]
async fn test_default_view_survives_edit_of_large_set() {
    let (gateway, store) = memory_gateway();
    let now = chrono::Local::now().naive_local();
    let mut rows: Vec<Record> = (0..150)
        .map(|i| {
            Record::new(
                format!("OLD-{i}"),
                "Hana",
                Some(now - chrono::Duration::days(30 + i)),
                false,
            )
        })
        .collect();
    rows.push(Record::new("NEW-1", "Hana", Some(now - chrono::Duration::days(1)), false));
    store.seed(&table(), &rows);

    let mut set = gateway.load_all().await.unwrap();
    assert_eq!(set.len(), 151);
    let shown: Vec<_> = set.filtered().iter().map(|r| r.id).collect();
    assert_eq!(shown.len(), 1);

    let old_id = set.original().iter().find(|r| r.order_number == "OLD-0").unwrap().id.unwrap();
    let report = Reconciler::new(&gateway)
        .apply_edits(
            &mut set,
            &[RecordEdit::stored(old_id, RecordChanges::new().analysis(true))],
            now,
        )
        .await
        .unwrap();

    assert_eq!(report.confirmed_in_store, 1);
    assert_eq!(set.filtered().iter().map(|r| r.id).collect::<Vec<_>>(), shown);
}

#[tokio::test]
async fn test_unfiltered_set_keeps_showing_everything_after_edit() {
    let (gateway, store) = memory_gateway();
    let rows: Vec<Record> = (0..120).map(|i| record(&format!("ORD-{i}"), "Ivo", 1)).collect();
    store.seed(&table(), &rows);
    let loaded = gateway.load_all().await.unwrap();
    let mut set = RecordSet::unfiltered(loaded.original().to_vec());
    let id = set.original()[0].id.unwrap();

    Reconciler::new(&gateway)
        .apply_edits(
            &mut set,
            &[RecordEdit::stored(id, RecordChanges::new().separator_name("Ivo Dias"))],
            now(),
        )
        .await
        .unwrap();

    assert_eq!(set.filtered().len(), 120);
}
