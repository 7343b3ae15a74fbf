#![forbid(unsafe_code)]

use super::super::*;
use super::{protected, recipients, require_actor};
use rusqlite::params;
use serde_json::json;
use tl_core::{BranchEventType, BranchLifecycle, EntityStatus};

impl SqliteStore {
    /// Soft-deletes every current row owned by `branch` and retires it.
    ///
    /// Returns `false` when the branch was already retired (deleted or
    /// merged); repeating a delete is not an error.
    pub fn delete_branch(&mut self, branch: &str, deleted_by: &str) -> Result<bool, StoreError> {
        let branch = parse_branch(branch)?;
        if branch.is_trunk() {
            return Err(protected(&branch, "deleted"));
        }
        let deleted_by = require_actor(deleted_by)?;

        let outcome = self.write_tx("delete_branch", |tx| {
            let record = require_branch_tx(tx, branch.as_str())?;
            if record.lifecycle_status != BranchLifecycle::Active {
                return Ok(None);
            }
            if let Some(lock) = &record.lock {
                return Err(StoreError::BranchLocked {
                    branch: branch.as_str().to_string(),
                    locked_by: lock.locked_by.clone(),
                    reason: lock.reason.clone(),
                    locked_at_ms: lock.locked_at_ms,
                });
            }

            let rows = current_rows_for_branch_tx(tx, branch.as_str(), false)?;
            for row in &rows {
                insert_version_tx(
                    tx,
                    NewVersion {
                        logical_id: &row.logical_id,
                        kind: row.kind,
                        branch: &branch,
                        status: EntityStatus::Deleted,
                        payload: &row.payload,
                        base_main_version: row.base_main_version,
                        created_by: deleted_by,
                    },
                )?;
            }
            tx.execute(
                "UPDATE branches SET lifecycle_status=?2, updated_at_ms=?3 WHERE name=?1",
                params![
                    branch.as_str(),
                    BranchLifecycle::Deleted.as_str(),
                    now_ms()
                ],
            )?;
            Ok(Some((record, rows.len())))
        })?;

        let Some((record, removed)) = outcome else {
            tracing::debug!(branch = branch.as_str(), "branch already retired");
            return Ok(false);
        };
        tracing::info!(branch = branch.as_str(), removed, "branch deleted");
        self.notify_event(
            BranchEventType::BranchDeleted,
            &branch,
            format!("branch {branch} deleted by {deleted_by}"),
            recipients(&record, deleted_by),
            json!({ "deleted_by": deleted_by, "records": removed }),
        );
        Ok(true)
    }
}
