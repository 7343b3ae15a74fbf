#![forbid(unsafe_code)]

use super::super::filter::fetch_current_tx;
use super::super::*;
use super::not_found;
use tl_core::{BranchContext, EntityKind, LogicalId, VersionedRecord};

impl SqliteStore {
    /// Every version of `(logical_id, branch)` in ascending order. A record
    /// never written on `branch` has an empty history there.
    pub fn get_version_history(
        &self,
        logical_id: &str,
        branch: &str,
    ) -> Result<Vec<VersionedRecord>, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        let branch = parse_branch(branch)?;
        require_branch_tx(&self.conn, branch.as_str())?;
        history_rows_tx(&self.conn, logical_id.as_str(), branch.as_str())
    }

    pub fn get_version(
        &self,
        logical_id: &str,
        branch: &str,
        version: i64,
    ) -> Result<VersionedRecord, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        let branch = parse_branch(branch)?;
        if version < 1 {
            return Err(StoreError::InvalidInput("version must be >= 1"));
        }
        version_row_tx(&self.conn, logical_id.as_str(), branch.as_str(), version)?
            .ok_or_else(|| not_found(logical_id.as_str(), branch.as_str()))
    }

    /// Current row of `logical_id` as seen through `ctx`.
    pub fn get_entity(
        &self,
        ctx: &BranchContext,
        logical_id: &str,
        include_deleted: bool,
    ) -> Result<Option<VersionedRecord>, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        require_readable_branch_tx(&self.conn, ctx.branch().as_str())?;
        let query = apply_status_filters(
            apply_branch_filters(VersionQuery::new().logical_id(&logical_id), ctx),
            include_deleted,
        );
        Ok(fetch_current_tx(&self.conn, &query)?.into_iter().next())
    }

    /// Current rows visible through `ctx`, optionally narrowed to one kind.
    pub fn list_entities(
        &self,
        ctx: &BranchContext,
        kind: Option<EntityKind>,
        include_deleted: bool,
    ) -> Result<Vec<VersionedRecord>, StoreError> {
        require_readable_branch_tx(&self.conn, ctx.branch().as_str())?;
        let mut query = VersionQuery::new();
        if let Some(kind) = kind {
            query = query.kind(kind);
        }
        let query = apply_status_filters(apply_branch_filters(query, ctx), include_deleted);
        fetch_current_tx(&self.conn, &query)
    }

    /// [`Self::get_entity`] against the context bound on this thread.
    pub fn get_entity_in_context(
        &self,
        logical_id: &str,
        include_deleted: bool,
    ) -> Result<Option<VersionedRecord>, StoreError> {
        self.get_entity(&BranchContext::current(), logical_id, include_deleted)
    }

    /// [`Self::list_entities`] against the context bound on this thread.
    pub fn list_entities_in_context(
        &self,
        kind: Option<EntityKind>,
        include_deleted: bool,
    ) -> Result<Vec<VersionedRecord>, StoreError> {
        self.list_entities(&BranchContext::current(), kind, include_deleted)
    }
}
