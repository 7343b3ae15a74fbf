#![forbid(unsafe_code)]

use super::super::StoreError;
use super::rows::{RawVersionRow, version_columns};
use super::time::now_ms;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde_json::Value;
use tl_core::{BranchName, Entity, EntityKind, EntityStatus, LogicalId, VersionedRecord};

pub(in crate::store) struct NewVersion<'a> {
    pub logical_id: &'a LogicalId,
    pub kind: EntityKind,
    pub branch: &'a BranchName,
    pub status: EntityStatus,
    pub payload: &'a Value,
    pub base_main_version: Option<i64>,
    pub created_by: &'a str,
}

pub(in crate::store) fn next_version_tx(
    conn: &Connection,
    logical_id: &str,
    branch: &str,
) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM entity_versions WHERE logical_id=?1 AND branch=?2",
        params![logical_id, branch],
        |row| row.get(0),
    )?)
}

/// Appends the next version for `(logical_id, branch)`. Rows are never
/// rewritten; every change is a new row.
pub(in crate::store) fn insert_version_tx(
    tx: &Transaction<'_>,
    args: NewVersion<'_>,
) -> Result<VersionedRecord, StoreError> {
    let NewVersion {
        logical_id,
        kind,
        branch,
        status,
        payload,
        base_main_version,
        created_by,
    } = args;

    let version = next_version_tx(tx, logical_id.as_str(), branch.as_str())?;
    let created_at_ms = now_ms();
    let payload_json = serde_json::to_string(payload)?;

    let inserted = tx.execute(
        r#"
        INSERT INTO entity_versions(
          logical_id, branch, version, kind, status, payload_json, base_main_version, created_at_ms, created_by
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            logical_id.as_str(),
            branch.as_str(),
            version,
            kind.as_str(),
            status.as_str(),
            payload_json,
            base_main_version,
            created_at_ms,
            created_by
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            return Err(StoreError::SerializationRetry { attempts: 1 });
        }
        Err(err) => return Err(err.into()),
    }

    tracing::debug!(
        logical_id = logical_id.as_str(),
        branch = branch.as_str(),
        version,
        status = status.as_str(),
        "version appended"
    );

    Ok(Entity {
        logical_id: logical_id.clone(),
        kind,
        branch: branch.clone(),
        version,
        status,
        payload: payload.clone(),
        created_at_ms,
        created_by: created_by.to_string(),
        base_main_version,
    })
}

pub(in crate::store) fn current_row_tx(
    conn: &Connection,
    logical_id: &str,
    branch: &str,
) -> Result<Option<VersionedRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM entity_versions v WHERE v.logical_id=?1 AND v.branch=?2 \
         ORDER BY v.version DESC LIMIT 1",
        version_columns("v")
    );
    conn.query_row(&sql, params![logical_id, branch], RawVersionRow::read)
        .optional()?
        .map(RawVersionRow::into_record)
        .transpose()
}

pub(in crate::store) fn version_row_tx(
    conn: &Connection,
    logical_id: &str,
    branch: &str,
    version: i64,
) -> Result<Option<VersionedRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM entity_versions v WHERE v.logical_id=?1 AND v.branch=?2 AND v.version=?3",
        version_columns("v")
    );
    conn.query_row(&sql, params![logical_id, branch, version], RawVersionRow::read)
        .optional()?
        .map(RawVersionRow::into_record)
        .transpose()
}

/// Latest row on `branch` that is not a deletion marker.
pub(in crate::store) fn last_live_row_tx(
    conn: &Connection,
    logical_id: &str,
    branch: &str,
) -> Result<Option<VersionedRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM entity_versions v WHERE v.logical_id=?1 AND v.branch=?2 \
         AND v.status <> 'deleted' ORDER BY v.version DESC LIMIT 1",
        version_columns("v")
    );
    conn.query_row(&sql, params![logical_id, branch], RawVersionRow::read)
        .optional()?
        .map(RawVersionRow::into_record)
        .transpose()
}

pub(in crate::store) fn history_rows_tx(
    conn: &Connection,
    logical_id: &str,
    branch: &str,
) -> Result<Vec<VersionedRecord>, StoreError> {
    let sql = format!(
        "SELECT {} FROM entity_versions v WHERE v.logical_id=?1 AND v.branch=?2 \
         ORDER BY v.version ASC",
        version_columns("v")
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![logical_id, branch])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(RawVersionRow::read(row)?.into_record()?);
    }
    Ok(out)
}

/// Current row of every logical id that has rows on `branch`, ordered by id.
pub(in crate::store) fn current_rows_for_branch_tx(
    conn: &Connection,
    branch: &str,
    include_deleted: bool,
) -> Result<Vec<VersionedRecord>, StoreError> {
    let mut sql = format!(
        r#"
        SELECT {}
        FROM entity_versions v
        JOIN (
          SELECT logical_id, MAX(version) AS version
          FROM entity_versions
          WHERE branch=?1
          GROUP BY logical_id
        ) h ON h.logical_id = v.logical_id AND h.version = v.version
        WHERE v.branch=?1
        "#,
        version_columns("v")
    );
    if !include_deleted {
        sql.push_str(" AND v.status <> 'deleted'");
    }
    sql.push_str(" ORDER BY v.logical_id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![branch])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(RawVersionRow::read(row)?.into_record()?);
    }
    Ok(out)
}

/// Row a write on `branch` builds on, with the trunk version it descends from.
/// A branch without its own chain starts from the trunk's current row.
pub(in crate::store) fn write_source_tx(
    conn: &Connection,
    logical_id: &str,
    branch: &BranchName,
) -> Result<Option<(VersionedRecord, Option<i64>)>, StoreError> {
    if let Some(row) = current_row_tx(conn, logical_id, branch.as_str())? {
        let base = row.base_main_version;
        return Ok(Some((row, base)));
    }
    if branch.is_trunk() {
        return Ok(None);
    }
    Ok(current_row_tx(conn, logical_id, BranchName::trunk().as_str())?.map(|row| {
        let version = row.version;
        (row, Some(version))
    }))
}
