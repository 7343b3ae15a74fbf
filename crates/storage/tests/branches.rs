#![forbid(unsafe_code)]

mod common;

use common::{branch_only_view, ids, merged_view, open_store, read, seed, trunk};
use serde_json::json;
use tl_core::{BranchContext, BranchLifecycle, EntityKind, EntityStatus};
use tl_storage::{StoreError, VersionQuery, apply_branch_filters, apply_status_filters};

#[test]
fn generated_branch_names_are_sequential() {
    let (_dir, mut store) = open_store();
    let first = store
        .create_branch(Some("CR-1"), "alice")
        .expect("create branch");
    let second = store.create_branch(None, "alice").expect("create branch");

    assert_eq!(first.name.as_str(), "co-001");
    assert_eq!(second.name.as_str(), "co-002");
    assert_eq!(first.owner_reference.as_deref(), Some("CR-1"));
    assert_eq!(first.base_branch.as_ref().map(|b| b.as_str()), Some("main"));
    assert!(first.is_active());
    assert!(!first.is_locked());

    store
        .create_branch_named("co-003", None, "alice")
        .expect("named branch");
    let skipped = store.create_branch(None, "alice").expect("create branch");
    assert_eq!(skipped.name.as_str(), "co-004");

    assert!(matches!(
        store.create_branch_named("co-001", None, "alice"),
        Err(StoreError::BranchAlreadyExists { .. })
    ));
    assert!(matches!(
        store.create_branch_named("main", None, "alice"),
        Err(StoreError::BranchAlreadyExists { .. })
    ));
    assert!(matches!(
        store.create_branch_named("CO 5", None, "alice"),
        Err(StoreError::InvalidBranchName { .. })
    ));

    let names: Vec<String> = store
        .list_branches(false)
        .expect("list")
        .into_iter()
        .map(|branch| branch.name.into_string())
        .collect();
    assert_eq!(names, vec!["main", "co-001", "co-002", "co-003", "co-004"]);
}

#[test]
fn branch_writes_never_touch_trunk() {
    let (_dir, mut store) = open_store();
    let trunk_row = seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    let branch = store.create_branch(None, "alice").expect("branch");

    let copy = store
        .update_entity_with_version("wbe-1", branch.name.as_str(), &json!({"budget_allocation": 150}), "alice")
        .expect("branch update");
    assert_eq!(copy.version, 1);
    assert_eq!(copy.branch, branch.name);
    assert_eq!(copy.base_main_version, Some(1));

    let second = store
        .update_entity_with_version("wbe-1", branch.name.as_str(), &json!({"budget_allocation": 160}), "alice")
        .expect("branch update");
    assert_eq!(second.version, 2);
    assert_eq!(second.base_main_version, Some(1));

    assert_eq!(read(&store, &trunk(), "wbe-1"), Some(trunk_row));
    assert_eq!(store.get_version_history("wbe-1", "main").expect("history").len(), 1);
}

#[test]
fn merged_view_overlays_branch_rows_on_trunk() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    let untouched = seed(&mut store, "wbe-2", EntityKind::Wbe, json!({"budget_allocation": 200}));
    let branch = store.create_branch(None, "alice").expect("branch");
    let name = branch.name.as_str();

    let ctx = merged_view(name);
    assert_eq!(read(&store, &ctx, "wbe-2"), Some(untouched.clone()));
    assert_eq!(read(&store, &ctx, "wbe-1").map(|row| row.branch.into_string()), Some("main".to_string()));

    let touched = store
        .update_entity_with_version("wbe-1", name, &json!({"budget_allocation": 150}), "alice")
        .expect("branch update");
    assert_eq!(read(&store, &ctx, "wbe-1"), Some(touched));
    assert_eq!(read(&store, &ctx, "wbe-2"), Some(untouched));

    let listed = store.list_entities(&ctx, Some(EntityKind::Wbe), false).expect("list");
    assert_eq!(ids(&listed), vec!["wbe-1", "wbe-2"]);
    assert_eq!(listed[0].branch.as_str(), name);
    assert_eq!(listed[1].branch.as_str(), "main");
}

#[test]
fn branch_only_view_excludes_trunk_rows() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    seed(&mut store, "wbe-2", EntityKind::Wbe, json!({"budget_allocation": 200}));
    let branch = store.create_branch(None, "alice").expect("branch");
    let name = branch.name.as_str();

    let ctx = branch_only_view(name);
    assert!(store.list_entities(&ctx, None, false).expect("list").is_empty());
    assert!(read(&store, &ctx, "wbe-2").is_none());

    store
        .update_entity_with_version("wbe-1", name, &json!({"budget_allocation": 150}), "alice")
        .expect("branch update");
    store
        .create_entity("ce-1", EntityKind::CostElement, name, json!({"budget_amount": 5}), "alice")
        .expect("branch create");

    let listed = store.list_entities(&ctx, None, false).expect("list");
    assert_eq!(ids(&listed), vec!["ce-1", "wbe-1"]);
    assert!(read(&store, &ctx, "wbe-2").is_none());
}

#[test]
fn branch_deletion_hides_trunk_row_in_merged_view() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    let branch = store.create_branch(None, "alice").expect("branch");
    let name = branch.name.as_str();

    let marker = store
        .soft_delete_entity("wbe-1", name, "alice")
        .expect("branch delete");
    assert_eq!(marker.version, 1);
    assert_eq!(marker.status, EntityStatus::Deleted);

    let ctx = merged_view(name);
    assert!(read(&store, &ctx, "wbe-1").is_none());
    assert_eq!(
        store.get_entity(&ctx, "wbe-1", true).expect("get").map(|row| row.version),
        Some(1)
    );
    assert!(read(&store, &trunk(), "wbe-1").is_some());

    let restored = store.restore_entity("wbe-1", name, "alice").expect("restore");
    assert_eq!(restored.version, 2);
    assert_eq!(restored.payload, json!({"budget_allocation": 100}));
}

#[test]
fn scoped_context_routes_reads() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    let branch = store.create_branch(None, "alice").expect("branch");
    store
        .update_entity_with_version("wbe-1", branch.name.as_str(), &json!({"budget_allocation": 150}), "alice")
        .expect("branch update");

    let in_branch = BranchContext::new(branch.name.clone())
        .scope(|| store.get_entity_in_context("wbe-1", false))
        .expect("scoped read")
        .expect("present");
    assert_eq!(in_branch.payload["budget_allocation"], json!(150));

    let outside = store
        .get_entity_in_context("wbe-1", false)
        .expect("read")
        .expect("present");
    assert_eq!(outside.payload["budget_allocation"], json!(100));

    let only_touched = branch_only_view(branch.name.as_str())
        .scope(|| store.list_entities_in_context(None, false))
        .expect("scoped list");
    assert_eq!(ids(&only_touched), vec!["wbe-1"]);
}

#[test]
fn locked_branch_rejects_writes_until_unlocked() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    store.create_branch_named("co-1", None, "alice").expect("branch");

    let locked = store
        .lock_branch("co-1", "pm", "under review")
        .expect("lock");
    let lock = locked.lock.clone().expect("lock details");
    assert_eq!(lock.locked_by, "pm");
    assert_eq!(lock.reason, "under review");

    let err = store
        .update_entity_with_version("wbe-1", "co-1", &json!({"budget_allocation": 1}), "alice")
        .expect_err("locked branch must reject writes");
    match &err {
        StoreError::BranchLocked { branch, locked_by, reason, .. } => {
            assert_eq!(branch, "co-1");
            assert_eq!(locked_by, "pm");
            assert_eq!(reason, "under review");
        }
        other => panic!("expected BranchLocked, got {other:?}"),
    }
    assert!(err.is_branch_lifecycle());
    assert!(!err.is_transient());
    let message = err.to_string();
    assert!(
        message.starts_with("branch co-1 is locked by pm since "),
        "unexpected message: {message}"
    );
    assert!(message.ends_with(": under review"), "unexpected message: {message}");

    assert!(matches!(
        store.create_entity("ce-1", EntityKind::CostElement, "co-1", json!({}), "alice"),
        Err(StoreError::BranchLocked { .. })
    ));
    assert!(matches!(
        store.lock_branch("co-1", "someone-else", "again"),
        Err(StoreError::BranchLocked { .. })
    ));
    assert!(read(&store, &merged_view("co-1"), "wbe-1").is_some());
    assert!(store.get_branch("co-1").expect("get").is_locked());

    let unlocked = store.unlock_branch("co-1", "pm").expect("unlock");
    assert!(unlocked.lock.is_none());
    store.unlock_branch("co-1", "pm").expect("unlock twice is a no-op");
    store
        .update_entity_with_version("wbe-1", "co-1", &json!({"budget_allocation": 1}), "alice")
        .expect("writes allowed again");
}

#[test]
fn trunk_is_protected() {
    let (_dir, mut store) = open_store();
    assert!(matches!(
        store.lock_branch("main", "pm", "freeze"),
        Err(StoreError::ProtectedBranch { action: "locked", .. })
    ));
    assert!(matches!(
        store.delete_branch("main", "pm"),
        Err(StoreError::ProtectedBranch { action: "deleted", .. })
    ));
    assert!(matches!(
        store.clone_branch("main", Some("main"), "pm"),
        Err(StoreError::ProtectedBranch { .. })
    ));
    assert!(matches!(
        store.purge_branch("main", "pm"),
        Err(StoreError::ProtectedBranch { .. })
    ));

    let main = store.get_branch("main").expect("main exists");
    assert!(main.is_trunk());
    assert_eq!(main.lifecycle_status, BranchLifecycle::Active);
}

#[test]
fn clone_copies_the_merged_view_at_version_one() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    seed(&mut store, "wbe-2", EntityKind::Wbe, json!({"budget_allocation": 200}));
    seed(&mut store, "wbe-3", EntityKind::Wbe, json!({"budget_allocation": 300}));
    store
        .update_entity_with_version("wbe-2", "main", &json!({"budget_allocation": 210}), "alice")
        .expect("trunk update");
    store
        .soft_delete_entity("wbe-3", "main", "alice")
        .expect("trunk delete");

    store.create_branch_named("co-1", Some("CR-7"), "alice").expect("branch");
    store
        .update_entity_with_version("wbe-1", "co-1", &json!({"budget_allocation": 150}), "alice")
        .expect("branch update");
    store
        .update_entity_with_version("wbe-1", "co-1", &json!({"budget_allocation": 175}), "alice")
        .expect("branch update");

    let (clone, copied) = store
        .clone_branch("co-1", Some("what-if"), "bob")
        .expect("clone");
    assert_eq!(copied, 2);
    assert_eq!(clone.name.as_str(), "what-if");
    assert_eq!(clone.owner_reference.as_deref(), Some("CR-7"));

    let rows = store
        .list_entities(&branch_only_view("what-if"), None, true)
        .expect("list");
    assert_eq!(ids(&rows), vec!["wbe-1", "wbe-2"]);
    assert!(rows.iter().all(|row| row.version == 1));
    assert_eq!(rows[0].payload["budget_allocation"], json!(175));
    assert_eq!(rows[0].base_main_version, Some(1));
    assert_eq!(rows[1].payload["budget_allocation"], json!(210));
    assert_eq!(rows[1].base_main_version, Some(2));

    let (generated, _) = store.clone_branch("main", None, "bob").expect("clone trunk");
    assert_eq!(generated.name.as_str(), "co-001");
    assert!(matches!(
        store.clone_branch("main", Some("what-if"), "bob"),
        Err(StoreError::BranchAlreadyExists { .. })
    ));
}

#[test]
fn delete_branch_is_idempotent() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    store.create_branch_named("co-1", None, "alice").expect("branch");
    store
        .update_entity_with_version("wbe-1", "co-1", &json!({"budget_allocation": 150}), "alice")
        .expect("branch update");

    assert!(store.delete_branch("co-1", "alice").expect("delete"));
    assert!(!store.delete_branch("co-1", "alice").expect("delete again"));

    let history = store.get_version_history("wbe-1", "co-1").expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status, EntityStatus::Deleted);
    assert_eq!(
        store.get_branch("co-1").expect("get").lifecycle_status,
        BranchLifecycle::Deleted
    );

    assert!(matches!(
        store.update_entity_with_version("wbe-1", "co-1", &json!({"budget_allocation": 1}), "alice"),
        Err(StoreError::BranchNotFound { .. })
    ));
    assert!(matches!(
        store.get_entity(&merged_view("co-1"), "wbe-1", false),
        Err(StoreError::BranchNotFound { .. })
    ));
    assert!(read(&store, &trunk(), "wbe-1").is_some());

    assert_eq!(store.list_branches(false).expect("list").len(), 1);
    assert_eq!(store.list_branches(true).expect("list").len(), 2);
}

#[test]
fn locked_branch_cannot_be_deleted() {
    let (_dir, mut store) = open_store();
    store.create_branch_named("co-1", None, "alice").expect("branch");
    store.lock_branch("co-1", "pm", "approval").expect("lock");

    assert!(matches!(
        store.delete_branch("co-1", "alice"),
        Err(StoreError::BranchLocked { .. })
    ));
}

#[test]
fn purge_removes_retired_branches_only() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "wbe-1", EntityKind::Wbe, json!({"budget_allocation": 100}));
    store.create_branch_named("co-1", None, "alice").expect("branch");
    store
        .update_entity_with_version("wbe-1", "co-1", &json!({"budget_allocation": 150}), "alice")
        .expect("branch update");

    assert!(matches!(
        store.purge_branch("co-1", "admin"),
        Err(StoreError::InvalidInput(_))
    ));

    store.delete_branch("co-1", "alice").expect("delete");
    assert_eq!(store.purge_branch("co-1", "admin").expect("purge"), 2);
    assert!(matches!(
        store.get_branch("co-1"),
        Err(StoreError::BranchNotFound { .. })
    ));
    assert!(read(&store, &trunk(), "wbe-1").is_some());

    let reused = store
        .create_branch_named("co-1", None, "alice")
        .expect("name is free again");
    assert!(reused.is_active());
    assert!(store
        .get_version_history("wbe-1", "co-1")
        .expect("history")
        .is_empty());
}

#[test]
fn composed_queries_follow_branch_and_status_filters() {
    let (_dir, mut store) = open_store();
    seed(&mut store, "a", EntityKind::Project, json!({"budget": 1}));
    seed(&mut store, "b", EntityKind::CostElement, json!({"budget_amount": 2}));
    store.create_branch_named("co-1", None, "alice").expect("branch");
    store
        .update_entity_with_version("a", "co-1", &json!({"budget": 3}), "alice")
        .expect("branch update");
    store.soft_delete_entity("b", "co-1", "alice").expect("branch delete");

    let everything = store.fetch_current(&VersionQuery::new()).expect("all rows");
    let pairs: Vec<(String, String)> = everything
        .iter()
        .map(|row| (row.logical_id.as_str().to_string(), row.branch.as_str().to_string()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("a".to_string(), "co-1".to_string()),
            ("a".to_string(), "main".to_string()),
            ("b".to_string(), "co-1".to_string()),
            ("b".to_string(), "main".to_string()),
        ]
    );

    let live = apply_status_filters(
        apply_branch_filters(VersionQuery::new(), &merged_view("co-1")),
        false,
    );
    let rows = store.fetch_current(&live).expect("live rows");
    assert_eq!(ids(&rows), vec!["a"]);
    assert_eq!(rows[0].payload, json!({"budget": 3}));

    let with_deleted = apply_status_filters(
        apply_branch_filters(
            VersionQuery::new().kind(EntityKind::CostElement),
            &merged_view("co-1"),
        ),
        true,
    );
    let rows = store.fetch_current(&with_deleted).expect("deleted rows");
    assert_eq!(ids(&rows), vec!["b"]);
    assert_eq!(rows[0].status, EntityStatus::Deleted);
}
