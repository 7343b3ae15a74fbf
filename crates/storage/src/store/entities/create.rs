#![forbid(unsafe_code)]

use super::super::*;
use super::{require_author, require_object};
use rusqlite::{OptionalExtension, Transaction, params};
use serde_json::Value;
use tl_core::{EntityKind, EntityStatus, LogicalId, TRUNK_BRANCH, VersionedRecord};

impl SqliteStore {
    /// Hands out the next unused `<kind>-<n>` id.
    pub fn allocate_logical_id(&mut self, kind: EntityKind) -> Result<LogicalId, StoreError> {
        let counter = format!("logical_id.{}", kind.as_str());
        self.write_tx("allocate_logical_id", |tx| loop {
            let n = next_counter_tx(tx, &counter)?;
            let candidate = format!("{}-{n}", kind.as_str());
            if !logical_id_in_use_tx(tx, &candidate)? {
                return Ok(LogicalId::try_new(candidate)?);
            }
        })
    }

    /// Writes version 1 of a new record on `branch`.
    pub fn create_entity(
        &mut self,
        logical_id: &str,
        kind: EntityKind,
        branch: &str,
        payload: Value,
        author: &str,
    ) -> Result<VersionedRecord, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        let branch = parse_branch(branch)?;
        let author = require_author(author)?;
        require_object(&payload)?;

        self.write_tx("create_entity", |tx| {
            require_writable_branch_tx(tx, branch.as_str())?;
            if let Some(holder) = duplicate_holder_tx(tx, &logical_id, kind, branch.as_str())? {
                return Err(StoreError::DuplicateLogicalId {
                    logical_id: logical_id.as_str().to_string(),
                    branch: holder,
                });
            }
            insert_version_tx(
                tx,
                NewVersion {
                    logical_id: &logical_id,
                    kind,
                    branch: &branch,
                    status: EntityStatus::Active,
                    payload: &payload,
                    base_main_version: None,
                    created_by: author,
                },
            )
        })
    }
}

fn logical_id_in_use_tx(tx: &Transaction<'_>, logical_id: &str) -> Result<bool, StoreError> {
    Ok(tx
        .query_row(
            "SELECT 1 FROM entity_versions WHERE logical_id=?1 LIMIT 1",
            params![logical_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Branch already holding `logical_id` in a way a new record would collide
/// with: any row on the target branch or on trunk, or a row of another kind
/// anywhere.
fn duplicate_holder_tx(
    tx: &Transaction<'_>,
    logical_id: &LogicalId,
    kind: EntityKind,
    branch: &str,
) -> Result<Option<String>, StoreError> {
    Ok(tx
        .query_row(
            r#"
            SELECT branch FROM entity_versions
            WHERE logical_id=?1 AND (branch=?2 OR branch=?3 OR kind<>?4)
            ORDER BY CASE WHEN branch=?2 THEN 0 ELSE 1 END
            LIMIT 1
            "#,
            params![logical_id.as_str(), branch, TRUNK_BRANCH, kind.as_str()],
            |row| row.get(0),
        )
        .optional()?)
}
