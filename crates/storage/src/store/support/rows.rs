#![forbid(unsafe_code)]

use super::super::StoreError;
use rusqlite::Row;
use tl_core::{
    BranchLifecycle, BranchLock, BranchName, BranchRecord, Entity, EntityKind, EntityStatus,
    LogicalId, VersionedRecord,
};

/// Column list matching [`RawVersionRow::read`], prefixed for a table alias.
pub(in crate::store) fn version_columns(alias: &str) -> String {
    [
        "logical_id",
        "kind",
        "branch",
        "version",
        "status",
        "payload_json",
        "base_main_version",
        "created_at_ms",
        "created_by",
    ]
    .iter()
    .map(|col| format!("{alias}.{col}"))
    .collect::<Vec<_>>()
    .join(", ")
}

pub(in crate::store) struct RawVersionRow {
    logical_id: String,
    kind: String,
    branch: String,
    version: i64,
    status: String,
    payload_json: String,
    base_main_version: Option<i64>,
    created_at_ms: i64,
    created_by: String,
}

impl RawVersionRow {
    pub(in crate::store) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            logical_id: row.get(0)?,
            kind: row.get(1)?,
            branch: row.get(2)?,
            version: row.get(3)?,
            status: row.get(4)?,
            payload_json: row.get(5)?,
            base_main_version: row.get(6)?,
            created_at_ms: row.get(7)?,
            created_by: row.get(8)?,
        })
    }

    pub(in crate::store) fn into_record(self) -> Result<VersionedRecord, StoreError> {
        Ok(Entity {
            logical_id: LogicalId::try_new(self.logical_id)
                .map_err(|_| StoreError::InvalidInput("invalid logical_id row"))?,
            kind: EntityKind::parse(&self.kind)
                .map_err(|_| StoreError::InvalidInput("invalid kind row"))?,
            branch: BranchName::try_new(self.branch)
                .map_err(|_| StoreError::InvalidInput("invalid branch row"))?,
            version: self.version,
            status: EntityStatus::parse(&self.status)
                .map_err(|_| StoreError::InvalidInput("invalid status row"))?,
            payload: serde_json::from_str(&self.payload_json)?,
            created_at_ms: self.created_at_ms,
            created_by: self.created_by,
            base_main_version: self.base_main_version,
        })
    }
}

pub(in crate::store) const BRANCH_COLUMNS: &str = "name, base_branch, owner_reference, created_by, lifecycle_status, \
     locked_by, lock_reason, locked_at_ms, created_at_ms, merged_at_ms";

pub(in crate::store) struct RawBranchRow {
    name: String,
    base_branch: Option<String>,
    owner_reference: Option<String>,
    created_by: String,
    lifecycle_status: String,
    locked_by: Option<String>,
    lock_reason: Option<String>,
    locked_at_ms: Option<i64>,
    created_at_ms: i64,
    merged_at_ms: Option<i64>,
}

impl RawBranchRow {
    pub(in crate::store) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            base_branch: row.get(1)?,
            owner_reference: row.get(2)?,
            created_by: row.get(3)?,
            lifecycle_status: row.get(4)?,
            locked_by: row.get(5)?,
            lock_reason: row.get(6)?,
            locked_at_ms: row.get(7)?,
            created_at_ms: row.get(8)?,
            merged_at_ms: row.get(9)?,
        })
    }

    pub(in crate::store) fn into_record(self) -> Result<BranchRecord, StoreError> {
        let lock = match (self.locked_by, self.locked_at_ms) {
            (Some(locked_by), Some(locked_at_ms)) => Some(BranchLock {
                locked_by,
                reason: self.lock_reason.unwrap_or_default(),
                locked_at_ms,
            }),
            _ => None,
        };
        Ok(BranchRecord {
            name: BranchName::try_new(self.name)
                .map_err(|_| StoreError::InvalidInput("invalid branch row"))?,
            base_branch: self
                .base_branch
                .map(BranchName::try_new)
                .transpose()
                .map_err(|_| StoreError::InvalidInput("invalid base_branch row"))?,
            owner_reference: self.owner_reference,
            created_by: self.created_by,
            lock,
            lifecycle_status: BranchLifecycle::parse(&self.lifecycle_status)
                .map_err(|_| StoreError::InvalidInput("invalid lifecycle_status row"))?,
            created_at_ms: self.created_at_ms,
            merged_at_ms: self.merged_at_ms,
        })
    }
}
