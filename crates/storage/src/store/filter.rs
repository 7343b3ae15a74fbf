#![forbid(unsafe_code)]

use super::support::{RawVersionRow, version_columns};
use super::{SqliteStore, StoreError};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use tl_core::{BranchContext, EntityKind, LogicalId, TRUNK_BRANCH, VersionedRecord, ViewMode};

/// A read over current rows (the highest version per `(logical_id, branch)`).
///
/// Without filters it spans every branch. [`apply_branch_filters`] narrows it
/// to one context's view and [`apply_status_filters`] hides deletion markers.
#[derive(Clone, Debug, Default)]
pub struct VersionQuery {
    clauses: Vec<String>,
    params: Vec<SqlValue>,
}

impl VersionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.clauses.push("v.kind = ?".to_string());
        self.params.push(SqlValue::Text(kind.as_str().to_string()));
        self
    }

    pub fn logical_id(mut self, logical_id: &LogicalId) -> Self {
        self.clauses.push("v.logical_id = ?".to_string());
        self.params
            .push(SqlValue::Text(logical_id.as_str().to_string()));
        self
    }

    /// SQL text and positional parameters, in order.
    pub fn render(&self) -> (String, Vec<SqlValue>) {
        let mut sql = format!(
            r#"
            SELECT {}
            FROM entity_versions v
            WHERE v.version = (
              SELECT MAX(m.version) FROM entity_versions m
              WHERE m.logical_id = v.logical_id AND m.branch = v.branch
            )
            "#,
            version_columns("v")
        );
        for clause in &self.clauses {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        sql.push_str(" ORDER BY v.logical_id ASC, v.branch ASC");
        (sql, self.params.clone())
    }
}

/// Narrows `query` to what `ctx` can see.
///
/// `BranchOnly` keeps rows stored under the branch itself. `Merged` keeps the
/// branch row where one exists and falls back to trunk's current row
/// otherwise, so a branch reads as a sparse overlay on trunk.
pub fn apply_branch_filters(mut query: VersionQuery, ctx: &BranchContext) -> VersionQuery {
    let branch = ctx.branch().as_str().to_string();
    if ctx.is_trunk() || ctx.view_mode() == ViewMode::BranchOnly {
        query.clauses.push("v.branch = ?".to_string());
        query.params.push(SqlValue::Text(branch));
        return query;
    }

    query.clauses.push(
        "(v.branch = ? OR (v.branch = ? AND NOT EXISTS (\
         SELECT 1 FROM entity_versions o \
         WHERE o.logical_id = v.logical_id AND o.branch = ?)))"
            .to_string(),
    );
    query.params.push(SqlValue::Text(branch.clone()));
    query.params.push(SqlValue::Text(TRUNK_BRANCH.to_string()));
    query.params.push(SqlValue::Text(branch));
    query
}

/// Hides rows whose current status is `deleted` unless `include_deleted`.
pub fn apply_status_filters(mut query: VersionQuery, include_deleted: bool) -> VersionQuery {
    if !include_deleted {
        query.clauses.push("v.status <> 'deleted'".to_string());
    }
    query
}

pub(in crate::store) fn fetch_current_tx(
    conn: &Connection,
    query: &VersionQuery,
) -> Result<Vec<VersionedRecord>, StoreError> {
    let (sql, params) = query.render();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(RawVersionRow::read(row)?.into_record()?);
    }
    Ok(out)
}

impl SqliteStore {
    /// Runs a (usually filtered) current-row query.
    pub fn fetch_current(&self, query: &VersionQuery) -> Result<Vec<VersionedRecord>, StoreError> {
        fetch_current_tx(&self.conn, query)
    }
}
