#![forbid(unsafe_code)]
#![allow(dead_code)]

use serde_json::Value;
use tempfile::TempDir;
use tl_core::{BranchContext, BranchName, EntityKind, VersionedRecord, ViewMode};
use tl_storage::{SqliteStore, StoreConfig};

pub fn open_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteStore::open(dir.path()).expect("open store");
    (dir, store)
}

pub fn open_store_with(config: StoreConfig) -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteStore::open_with_config(dir.path(), config).expect("open store");
    (dir, store)
}

pub fn seed(store: &mut SqliteStore, id: &str, kind: EntityKind, payload: Value) -> VersionedRecord {
    store
        .create_entity(id, kind, "main", payload, "seeder")
        .expect("seed entity")
}

pub fn trunk() -> BranchContext {
    BranchContext::trunk()
}

pub fn merged_view(branch: &str) -> BranchContext {
    BranchContext::new(BranchName::try_new(branch).expect("branch name"))
}

pub fn branch_only_view(branch: &str) -> BranchContext {
    merged_view(branch).with_view_mode(ViewMode::BranchOnly)
}

pub fn read(store: &SqliteStore, ctx: &BranchContext, id: &str) -> Option<VersionedRecord> {
    store.get_entity(ctx, id, false).expect("get entity")
}

pub fn ids(rows: &[VersionedRecord]) -> Vec<String> {
    rows.iter()
        .map(|row| row.logical_id.as_str().to_string())
        .collect()
}
