#![forbid(unsafe_code)]

mod common;

use common::{open_store, read, seed, trunk};
use rusqlite::Connection;
use serde_json::json;
use tl_core::{BranchLifecycle, EntityKind, MergeStrategy};
use tl_storage::StoreError;

fn raw_connection(store: &tl_storage::SqliteStore) -> Connection {
    let path = store.storage_dir().join(&store.config().db_file_name);
    Connection::open(path).expect("open raw connection")
}

#[test]
fn merge_rolls_back_when_one_item_fails() {
    let (_dir, mut store) = open_store();
    store.create_branch_named("co-1", None, "alice").expect("branch");
    for n in 1..=5 {
        store
            .create_entity(
                &format!("r{n}"),
                EntityKind::CostElement,
                "co-1",
                json!({"budget_amount": n}),
                "alice",
            )
            .expect("create");
    }

    let raw = raw_connection(&store);
    raw.execute_batch(
        r#"
        CREATE TRIGGER fail_third_item
        BEFORE INSERT ON entity_versions
        WHEN NEW.branch = 'main' AND NEW.logical_id = 'r3'
        BEGIN
          SELECT RAISE(ABORT, 'injected failure');
        END;
        "#,
    )
    .expect("install trigger");

    let err = store
        .merge_branch("co-1", MergeStrategy::Manual, "approver")
        .expect_err("merge must fail on the third item");
    match &err {
        StoreError::Sql(inner) => assert!(
            inner.to_string().contains("injected failure"),
            "unexpected sqlite error: {inner}"
        ),
        other => panic!("expected Sql error, got {other:?}"),
    }
    assert!(!err.is_transient());

    for n in 1..=5 {
        let id = format!("r{n}");
        assert!(
            read(&store, &trunk(), &id).is_none(),
            "{id} must not be visible on trunk after a failed merge"
        );
        assert_eq!(
            store.get_version_history(&id, "co-1").expect("history").len(),
            1,
            "branch rows must be untouched"
        );
    }
    assert_eq!(
        store.get_branch("co-1").expect("branch").lifecycle_status,
        BranchLifecycle::Active
    );
    assert!(store.list_merge_records(None).expect("records").is_empty());

    raw.execute_batch("DROP TRIGGER fail_third_item;")
        .expect("drop trigger");
    let outcome = store
        .merge_branch("co-1", MergeStrategy::Manual, "approver")
        .expect("merge after fix");
    assert_eq!(outcome.applied.summary.creates, 5);
}

#[test]
fn failed_write_leaves_no_partial_version() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "a", EntityKind::Project, json!({"budget": 1}));

    let raw = raw_connection(&store);
    raw.execute_batch(
        r#"
        CREATE TRIGGER reject_versions
        BEFORE INSERT ON entity_versions
        BEGIN
          SELECT RAISE(ABORT, 'read only');
        END;
        "#,
    )
    .expect("install trigger");

    assert!(matches!(
        store.update_entity_with_version("a", "main", &json!({"budget": 2}), "alice"),
        Err(StoreError::Sql(_))
    ));
    assert_eq!(store.get_next_version("a", "main").expect("next"), 2);
}

#[test]
fn reopening_keeps_every_version() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    {
        let mut store = tl_storage::SqliteStore::open(dir.path()).expect("open store");
        seed(&mut store, "a", EntityKind::Project, json!({"budget": 1}));
        store.create_branch_named("co-1", None, "alice").expect("branch");
        store
            .update_entity_with_version("a", "co-1", &json!({"budget": 2}), "alice")
            .expect("branch update");
    }

    let store = tl_storage::SqliteStore::open(dir.path()).expect("reopen store");
    assert_eq!(store.get_version_history("a", "main").expect("history").len(), 1);
    assert_eq!(store.get_version_history("a", "co-1").expect("history").len(), 1);
    assert!(store.get_branch("co-1").expect("branch").is_active());
}

#[test]
fn newer_schema_requires_reset() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let store = tl_storage::SqliteStore::open(dir.path()).expect("open store");
    let raw = raw_connection(&store);
    drop(store);
    raw.execute("UPDATE meta SET value='99' WHERE key='schema_version'", [])
        .expect("bump schema version");

    match tl_storage::SqliteStore::open(dir.path()) {
        Err(StoreError::InvalidInput(message)) => assert!(message.starts_with("RESET_REQUIRED")),
        other => panic!("expected reset requirement, got {other:?}"),
    }
}
