#![forbid(unsafe_code)]

use super::super::StoreError;
use super::time::now_ms;
use rusqlite::{Connection, OptionalExtension, params};
use tl_core::{BranchLifecycle, TRUNK_BRANCH};

const SCHEMA_VERSION: &str = "1";

pub(in crate::store) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    preflight_gate(conn)?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS branches (
          name TEXT PRIMARY KEY,
          base_branch TEXT,
          owner_reference TEXT,
          created_by TEXT NOT NULL,
          lifecycle_status TEXT NOT NULL
            CHECK(lifecycle_status IN ('active', 'merged', 'deleted')),
          locked_by TEXT,
          lock_reason TEXT,
          locked_at_ms INTEGER,
          created_at_ms INTEGER NOT NULL,
          merged_at_ms INTEGER,
          updated_at_ms INTEGER NOT NULL,
          CHECK(base_branch IS NULL OR base_branch <> name),
          CHECK((locked_by IS NULL) = (locked_at_ms IS NULL))
        );

        CREATE TABLE IF NOT EXISTS entity_versions (
          logical_id TEXT NOT NULL,
          branch TEXT NOT NULL,
          version INTEGER NOT NULL CHECK(version >= 1),
          kind TEXT NOT NULL,
          status TEXT NOT NULL
            CHECK(status IN ('active', 'deleted', 'merged', 'archived')),
          payload_json TEXT NOT NULL,
          base_main_version INTEGER,
          created_at_ms INTEGER NOT NULL,
          created_by TEXT NOT NULL,
          PRIMARY KEY(logical_id, branch, version)
        );

        CREATE INDEX IF NOT EXISTS idx_entity_versions_branch_head
          ON entity_versions(branch, logical_id, version);

        CREATE INDEX IF NOT EXISTS idx_entity_versions_branch_kind
          ON entity_versions(branch, kind);

        CREATE TABLE IF NOT EXISTS merge_records (
          merge_id INTEGER PRIMARY KEY AUTOINCREMENT,
          branch TEXT NOT NULL,
          base_branch TEXT NOT NULL,
          strategy TEXT NOT NULL,
          creates INTEGER NOT NULL,
          updates INTEGER NOT NULL,
          deletes INTEGER NOT NULL,
          conflicts_overridden INTEGER NOT NULL,
          conflicts_skipped INTEGER NOT NULL,
          financial_impact REAL NOT NULL,
          merged_by TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          CHECK(branch <> base_branch)
        );

        CREATE INDEX IF NOT EXISTS idx_merge_records_branch
          ON merge_records(branch, created_at_ms);
        "#,
    )?;

    let now_ms = now_ms();
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION],
    )?;
    conn.execute(
        r#"
        INSERT OR IGNORE INTO branches(
          name, base_branch, owner_reference, created_by, lifecycle_status, created_at_ms, updated_at_ms
        )
        VALUES (?1, NULL, NULL, 'system', ?2, ?3, ?3)
        "#,
        params![TRUNK_BRANCH, BranchLifecycle::Active.as_str(), now_ms],
    )?;

    Ok(())
}

fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let has_meta = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='meta'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_meta {
        return Ok(());
    }

    let version = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    match version.as_deref() {
        None => Ok(()),
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema version mismatch",
        )),
    }
}
