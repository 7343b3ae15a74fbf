#![forbid(unsafe_code)]

use super::super::*;
use super::{protected, recipients, require_actor};
use rusqlite::params;
use serde_json::json;
use tl_core::{BranchEventType, BranchLock, BranchRecord};

impl SqliteStore {
    /// Blocks entity writes to `branch` until it is unlocked. Reads and
    /// merges are unaffected.
    pub fn lock_branch(
        &mut self,
        branch: &str,
        locked_by: &str,
        reason: &str,
    ) -> Result<BranchRecord, StoreError> {
        let branch = parse_branch(branch)?;
        if branch.is_trunk() {
            return Err(protected(&branch, "locked"));
        }
        let locked_by = require_actor(locked_by)?;
        let reason = reason.trim();

        let record = self.write_tx("lock_branch", |tx| {
            let mut record = require_writable_branch_tx(tx, branch.as_str())?;
            let now_ms = now_ms();
            tx.execute(
                r#"
                UPDATE branches
                SET locked_by=?2, lock_reason=?3, locked_at_ms=?4, updated_at_ms=?4
                WHERE name=?1
                "#,
                params![branch.as_str(), locked_by, reason, now_ms],
            )?;
            record.lock = Some(BranchLock {
                locked_by: locked_by.to_string(),
                reason: reason.to_string(),
                locked_at_ms: now_ms,
            });
            Ok(record)
        })?;

        tracing::info!(branch = branch.as_str(), locked_by, "branch locked");
        self.notify_event(
            BranchEventType::BranchLocked,
            &branch,
            format!("branch {branch} locked by {locked_by}: {reason}"),
            recipients(&record, locked_by),
            json!({ "locked_by": locked_by, "reason": reason }),
        );
        Ok(record)
    }

    /// Clears the lock. Unlocking a branch that is not locked is a no-op.
    pub fn unlock_branch(
        &mut self,
        branch: &str,
        unlocked_by: &str,
    ) -> Result<BranchRecord, StoreError> {
        let branch = parse_branch(branch)?;
        let unlocked_by = require_actor(unlocked_by)?;

        let (record, previous) = self.write_tx("unlock_branch", |tx| {
            let mut record = require_readable_branch_tx(tx, branch.as_str())?;
            let Some(previous) = record.lock.take() else {
                return Ok((record, None));
            };
            tx.execute(
                r#"
                UPDATE branches
                SET locked_by=NULL, lock_reason=NULL, locked_at_ms=NULL, updated_at_ms=?2
                WHERE name=?1
                "#,
                params![branch.as_str(), now_ms()],
            )?;
            Ok((record, Some(previous)))
        })?;

        if let Some(previous) = previous {
            tracing::info!(branch = branch.as_str(), unlocked_by, "branch unlocked");
            self.notify_event(
                BranchEventType::BranchUnlocked,
                &branch,
                format!("branch {branch} unlocked by {unlocked_by}"),
                recipients(&record, unlocked_by),
                json!({
                    "unlocked_by": unlocked_by,
                    "previously_locked_by": previous.locked_by,
                    "locked_at": format_ts_ms(previous.locked_at_ms),
                }),
            );
        }
        Ok(record)
    }
}
