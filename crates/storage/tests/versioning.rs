#![forbid(unsafe_code)]

mod common;

use common::{open_store, read, seed, trunk};
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use tl_core::{EntityKind, EntityStatus, VersionedPayload};
use tl_storage::{SqliteStore, StoreError};

#[test]
fn sequential_updates_number_versions_without_gaps() {
    let (_dir, mut store) = open_store();
    seed(
        &mut store,
        "wbe-1",
        EntityKind::Wbe,
        json!({"name": "Civil works", "budget_allocation": 100}),
    );

    for n in 0..5 {
        let row = store
            .update_entity_with_version("wbe-1", "main", &json!({"budget_allocation": 101 + n}), "alice")
            .expect("update");
        assert_eq!(row.version, 2 + n);
    }

    let history = store.get_version_history("wbe-1", "main").expect("history");
    let versions: Vec<i64> = history.iter().map(|row| row.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(history[5].payload["budget_allocation"], json!(105));
    assert_eq!(history[5].payload["name"], json!("Civil works"));
    assert_eq!(history[5].created_by, "alice");
    assert_eq!(store.get_next_version("wbe-1", "main").expect("next"), 7);
    assert_eq!(store.get_next_version("wbe-9", "main").expect("next"), 1);

    let second = store.get_version("wbe-1", "main", 2).expect("version 2");
    assert_eq!(second.payload["budget_allocation"], json!(101));
    assert!(matches!(
        store.get_version("wbe-1", "main", 9),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn merge_patch_removes_fields_set_to_null() {
    let (_dir, mut store) = open_store();
    seed(
        &mut store,
        "ce-1",
        EntityKind::CostElement,
        json!({"name": "Steel", "budget_amount": 10, "note": "draft"}),
    );

    let row = store
        .update_entity_with_version("ce-1", "main", &json!({"note": null, "budget_amount": 12}), "bob")
        .expect("update");
    assert_eq!(row.payload, json!({"name": "Steel", "budget_amount": 12}));

    let same = store
        .update_entity_with_version("ce-1", "main", &json!({}), "bob")
        .expect("empty patch still versions");
    assert_eq!(same.version, 3);
    assert_eq!(same.payload, row.payload);
}

#[test]
fn concurrent_writers_get_distinct_consecutive_versions() {
    const WRITERS: usize = 4;
    const UPDATES: usize = 10;

    let dir = TempDir::new().expect("temp dir");
    let mut observer = SqliteStore::open(dir.path()).expect("open store");
    seed(
        &mut observer,
        "ce-1",
        EntityKind::CostElement,
        json!({"name": "Rebar", "budget_amount": 0}),
    );

    let writers: Vec<SqliteStore> = (0..WRITERS)
        .map(|_| SqliteStore::open(dir.path()).expect("open writer"))
        .collect();
    std::thread::scope(|scope| {
        for (writer, mut store) in writers.into_iter().enumerate() {
            scope.spawn(move || {
                for n in 0..UPDATES {
                    store
                        .update_entity_with_version(
                            "ce-1",
                            "main",
                            &json!({"last_writer": format!("w{writer}-{n}")}),
                            &format!("writer-{writer}"),
                        )
                        .expect("concurrent update");
                }
            });
        }
    });

    let history = observer.get_version_history("ce-1", "main").expect("history");
    let versions: Vec<i64> = history.iter().map(|row| row.version).collect();
    let expected: Vec<i64> = (1..=(1 + WRITERS * UPDATES) as i64).collect();
    assert_eq!(versions, expected);

    for writer in 0..WRITERS {
        let author = format!("writer-{writer}");
        let count = history.iter().filter(|row| row.created_by == author).count();
        assert_eq!(count, UPDATES, "every update of {author} must be recorded");
    }
}

#[test]
fn soft_delete_then_restore_lands_at_n_plus_two() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "co-item-1", EntityKind::ChangeOrder, json!({"amount": 10}));
    store
        .update_entity_with_version("co-item-1", "main", &json!({"amount": 20}), "alice")
        .expect("update");

    let deleted = store
        .soft_delete_entity("co-item-1", "main", "alice")
        .expect("soft delete");
    assert_eq!(deleted.version, 3);
    assert_eq!(deleted.status, EntityStatus::Deleted);
    assert_eq!(deleted.payload, json!({"amount": 20}));
    assert!(read(&store, &trunk(), "co-item-1").is_none());
    let hidden = store
        .get_entity(&trunk(), "co-item-1", true)
        .expect("include deleted")
        .expect("deleted row is still current");
    assert_eq!(hidden.version, 3);

    let restored = store
        .restore_entity("co-item-1", "main", "alice")
        .expect("restore");
    assert_eq!(restored.version, 4);
    assert_eq!(restored.status, EntityStatus::Active);
    assert_eq!(restored.payload, json!({"amount": 20}));
    assert_eq!(read(&store, &trunk(), "co-item-1"), Some(restored));
}

#[test]
fn invalid_writes_are_rejected_with_typed_errors() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "project-1", EntityKind::Project, json!({"budget": 1}));

    assert!(matches!(
        store.create_entity("project-1", EntityKind::Project, "main", json!({}), "alice"),
        Err(StoreError::DuplicateLogicalId { .. })
    ));
    assert!(matches!(
        store.update_entity_with_version("project-9", "main", &json!({"budget": 2}), "alice"),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.restore_entity("project-1", "main", "alice"),
        Err(StoreError::NotDeleted { .. })
    ));
    assert!(matches!(
        store.create_entity("project-2", EntityKind::Project, "main", json!([1, 2]), "alice"),
        Err(StoreError::InvalidInput(_))
    ));
    assert!(matches!(
        store.create_entity("project-2", EntityKind::Project, "Bad_Branch", json!({}), "alice"),
        Err(StoreError::InvalidBranchName { .. })
    ));
    assert!(matches!(
        store.create_entity("project-2", EntityKind::Project, "co-404", json!({}), "alice"),
        Err(StoreError::BranchNotFound { .. })
    ));
    assert!(matches!(
        store.create_entity(" padded ", EntityKind::Project, "main", json!({}), "alice"),
        Err(StoreError::InvalidLogicalId(_))
    ));

    store
        .soft_delete_entity("project-1", "main", "alice")
        .expect("soft delete");
    assert!(matches!(
        store.update_entity_with_version("project-1", "main", &json!({"budget": 3}), "alice"),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.soft_delete_entity("project-1", "main", "alice"),
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.create_entity("project-1", EntityKind::Project, "main", json!({}), "alice"),
        Err(StoreError::DuplicateLogicalId { .. })
    ));
}

#[test]
fn hard_delete_removes_the_whole_chain() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "forecast-1", EntityKind::Forecast, json!({"estimate_at_completion": 5}));
    store
        .update_entity_with_version("forecast-1", "main", &json!({"estimate_at_completion": 6}), "alice")
        .expect("update");

    assert_eq!(store.hard_delete_entity("forecast-1", "main").expect("hard delete"), 2);
    assert!(store
        .get_version_history("forecast-1", "main")
        .expect("history")
        .is_empty());
    assert!(matches!(
        store.hard_delete_entity("forecast-1", "main"),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn allocated_ids_skip_ids_already_in_use() {
    let (_dir, mut store) = open_store();
    let first = store.allocate_logical_id(EntityKind::Project).expect("allocate");
    assert_eq!(first.as_str(), "project-1");

    seed(&mut store, "project-2", EntityKind::Project, json!({}));
    let next = store.allocate_logical_id(EntityKind::Project).expect("allocate");
    assert_eq!(next.as_str(), "project-3");

    let other = store.allocate_logical_id(EntityKind::Wbe).expect("allocate");
    assert_eq!(other.as_str(), "wbe-1");
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct CostElement {
    name: String,
    budget_amount: f64,
}

impl VersionedPayload for CostElement {
    const KIND: EntityKind = EntityKind::CostElement;
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Project {
    name: String,
}

impl VersionedPayload for Project {
    const KIND: EntityKind = EntityKind::Project;
}

#[test]
fn typed_reads_decode_and_check_kind() {
    let (_dir, mut store) = open_store();
    let created = store
        .create_typed(
            "ce-7",
            "main",
            &CostElement {
                name: "Formwork".to_string(),
                budget_amount: 42.5,
            },
            "alice",
        )
        .expect("create typed");
    assert_eq!(created.kind, EntityKind::CostElement);

    let fetched = store
        .get_typed::<CostElement>(&trunk(), "ce-7")
        .expect("get typed")
        .expect("present");
    assert_eq!(fetched.payload, created.payload);
    assert_eq!(
        store.list_typed::<CostElement>(&trunk(), false).expect("list").len(),
        1
    );
    assert!(store.list_typed::<Project>(&trunk(), false).expect("list").is_empty());

    assert!(matches!(
        store.get_typed::<Project>(&trunk(), "ce-7"),
        Err(StoreError::KindMismatch {
            expected: EntityKind::Project,
            actual: EntityKind::CostElement,
            ..
        })
    ));
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Update,
    Delete,
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(prop_oneof![Just(Op::Update), Just(Op::Delete)], 1..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_write_sequence_keeps_versions_dense(ops in ops()) {
        let (_dir, mut store) = open_store();
        seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"step": 0}));
        let mut deleted = false;

        for (step, op) in ops.iter().enumerate() {
            let row = match (op, deleted) {
                (_, true) => store.restore_entity("wbe-1", "main", "prop"),
                (Op::Update, false) => store.update_entity_with_version(
                    "wbe-1",
                    "main",
                    &json!({"step": step + 1}),
                    "prop",
                ),
                (Op::Delete, false) => store.soft_delete_entity("wbe-1", "main", "prop"),
            }
            .expect("write");
            deleted = row.status == EntityStatus::Deleted;
        }

        let history = store.get_version_history("wbe-1", "main").expect("history");
        let versions: Vec<i64> = history.iter().map(|row| row.version).collect();
        let expected: Vec<i64> = (1..=(ops.len() as i64 + 1)).collect();
        prop_assert_eq!(versions, expected);
        prop_assert_eq!(history.last().map(|row| row.is_deleted()), Some(deleted));
    }
}
