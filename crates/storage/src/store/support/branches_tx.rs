#![forbid(unsafe_code)]

use super::super::StoreError;
use super::rows::{BRANCH_COLUMNS, RawBranchRow};
use rusqlite::{Connection, OptionalExtension, params};
use tl_core::{BranchLifecycle, BranchName, BranchRecord};

pub(in crate::store) fn parse_branch(name: &str) -> Result<BranchName, StoreError> {
    BranchName::try_new(name).map_err(|reason| StoreError::InvalidBranchName {
        name: name.to_string(),
        reason,
    })
}

pub(in crate::store) fn branch_record_tx(
    conn: &Connection,
    branch: &str,
) -> Result<Option<BranchRecord>, StoreError> {
    let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE name=?1");
    conn.query_row(&sql, params![branch], RawBranchRow::read)
        .optional()?
        .map(RawBranchRow::into_record)
        .transpose()
}

pub(in crate::store) fn branch_exists_tx(conn: &Connection, branch: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM branches WHERE name=?1",
            params![branch],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub(in crate::store) fn require_branch_tx(
    conn: &Connection,
    branch: &str,
) -> Result<BranchRecord, StoreError> {
    branch_record_tx(conn, branch)?.ok_or_else(|| StoreError::BranchNotFound {
        branch: branch.to_string(),
    })
}

/// Branch that accepts entity writes: active and not locked.
pub(in crate::store) fn require_writable_branch_tx(
    conn: &Connection,
    branch: &str,
) -> Result<BranchRecord, StoreError> {
    let record = require_branch_tx(conn, branch)?;
    match record.lifecycle_status {
        BranchLifecycle::Merged => {
            return Err(StoreError::AlreadyMerged {
                branch: branch.to_string(),
                merged_at_ms: record.merged_at_ms,
            });
        }
        BranchLifecycle::Deleted => {
            return Err(StoreError::BranchNotFound {
                branch: branch.to_string(),
            });
        }
        BranchLifecycle::Active => {}
    }
    if let Some(lock) = &record.lock {
        return Err(StoreError::BranchLocked {
            branch: branch.to_string(),
            locked_by: lock.locked_by.clone(),
            reason: lock.reason.clone(),
            locked_at_ms: lock.locked_at_ms,
        });
    }
    Ok(record)
}

/// Branch that can be read from: exists and has not been deleted.
pub(in crate::store) fn require_readable_branch_tx(
    conn: &Connection,
    branch: &str,
) -> Result<BranchRecord, StoreError> {
    let record = require_branch_tx(conn, branch)?;
    if record.lifecycle_status == BranchLifecycle::Deleted {
        return Err(StoreError::BranchNotFound {
            branch: branch.to_string(),
        });
    }
    Ok(record)
}
