#![forbid(unsafe_code)]

use super::super::*;
use super::{not_found, require_author};
use rusqlite::params;
use tl_core::{EntityStatus, LogicalId, TRUNK_BRANCH, VersionedRecord};

impl SqliteStore {
    /// Appends a `deleted` version carrying the current payload.
    pub fn soft_delete_entity(
        &mut self,
        logical_id: &str,
        branch: &str,
        author: &str,
    ) -> Result<VersionedRecord, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        let branch = parse_branch(branch)?;
        let author = require_author(author)?;

        self.write_tx("soft_delete_entity", |tx| {
            require_writable_branch_tx(tx, branch.as_str())?;
            let (source, base_main_version) =
                write_source_tx(tx, logical_id.as_str(), &branch)?
                    .filter(|(row, _)| !row.is_deleted())
                    .ok_or_else(|| not_found(logical_id.as_str(), branch.as_str()))?;

            insert_version_tx(
                tx,
                NewVersion {
                    logical_id: &logical_id,
                    kind: source.kind,
                    branch: &branch,
                    status: EntityStatus::Deleted,
                    payload: &source.payload,
                    base_main_version,
                    created_by: author,
                },
            )
        })
    }

    /// Appends an `active` version with the last payload the record had
    /// before it was deleted.
    pub fn restore_entity(
        &mut self,
        logical_id: &str,
        branch: &str,
        author: &str,
    ) -> Result<VersionedRecord, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        let branch = parse_branch(branch)?;
        let author = require_author(author)?;

        self.write_tx("restore_entity", |tx| {
            require_writable_branch_tx(tx, branch.as_str())?;
            let (source, base_main_version) = write_source_tx(tx, logical_id.as_str(), &branch)?
                .ok_or_else(|| not_found(logical_id.as_str(), branch.as_str()))?;
            if !source.is_deleted() {
                return Err(StoreError::NotDeleted {
                    logical_id: logical_id.as_str().to_string(),
                    branch: branch.as_str().to_string(),
                });
            }

            let live = match last_live_row_tx(tx, logical_id.as_str(), source.branch.as_str())? {
                Some(row) => Some(row),
                None if !source.branch.is_trunk() => {
                    last_live_row_tx(tx, logical_id.as_str(), TRUNK_BRANCH)?
                }
                None => None,
            };
            let payload = live.map(|row| row.payload).unwrap_or(source.payload);

            insert_version_tx(
                tx,
                NewVersion {
                    logical_id: &logical_id,
                    kind: source.kind,
                    branch: &branch,
                    status: EntityStatus::Active,
                    payload: &payload,
                    base_main_version,
                    created_by: author,
                },
            )
        })
    }

    /// Removes every version of `(logical_id, branch)`. Unlike a soft delete
    /// this cannot be undone; returns the number of rows removed.
    pub fn hard_delete_entity(&mut self, logical_id: &str, branch: &str) -> Result<usize, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        let branch = parse_branch(branch)?;

        let removed = self.write_tx("hard_delete_entity", |tx| {
            require_writable_branch_tx(tx, branch.as_str())?;
            let removed = tx.execute(
                "DELETE FROM entity_versions WHERE logical_id=?1 AND branch=?2",
                params![logical_id.as_str(), branch.as_str()],
            )?;
            if removed == 0 {
                return Err(not_found(logical_id.as_str(), branch.as_str()));
            }
            Ok(removed)
        })?;

        tracing::info!(
            logical_id = logical_id.as_str(),
            branch = branch.as_str(),
            removed,
            "version chain purged"
        );
        Ok(removed)
    }
}
