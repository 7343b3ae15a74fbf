#![forbid(unsafe_code)]

use super::super::*;
use super::{protected, recipients, require_actor};
use rusqlite::params;
use serde_json::json;
use tl_core::{BranchEventType, BranchLifecycle};

impl SqliteStore {
    /// Hard-deletes a retired branch: every version row it owns and the
    /// branch record itself. Merge records are kept. Returns the number of
    /// version rows removed.
    pub fn purge_branch(&mut self, branch: &str, purged_by: &str) -> Result<usize, StoreError> {
        let branch = parse_branch(branch)?;
        if branch.is_trunk() {
            return Err(protected(&branch, "purged"));
        }
        let purged_by = require_actor(purged_by)?;

        let (record, removed) = self.write_tx("purge_branch", |tx| {
            let record = require_branch_tx(tx, branch.as_str())?;
            if record.lifecycle_status == BranchLifecycle::Active {
                return Err(StoreError::InvalidInput(
                    "only merged or deleted branches can be purged",
                ));
            }
            let removed = tx.execute(
                "DELETE FROM entity_versions WHERE branch=?1",
                params![branch.as_str()],
            )?;
            tx.execute("DELETE FROM branches WHERE name=?1", params![branch.as_str()])?;
            Ok((record, removed))
        })?;

        tracing::info!(branch = branch.as_str(), removed, "branch purged");
        self.notify_event(
            BranchEventType::BranchPurged,
            &branch,
            format!("branch {branch} purged by {purged_by}"),
            recipients(&record, purged_by),
            json!({ "purged_by": purged_by, "rows": removed }),
        );
        Ok(removed)
    }
}
