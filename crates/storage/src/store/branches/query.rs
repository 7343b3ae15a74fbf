#![forbid(unsafe_code)]

use super::super::*;
use tl_core::BranchRecord;

impl SqliteStore {
    pub fn get_branch(&self, branch: &str) -> Result<BranchRecord, StoreError> {
        let branch = parse_branch(branch)?;
        require_branch_tx(&self.conn, branch.as_str())
    }

    /// Branches in creation order; retired (merged or deleted) ones only when
    /// `include_retired`.
    pub fn list_branches(&self, include_retired: bool) -> Result<Vec<BranchRecord>, StoreError> {
        let mut sql = format!("SELECT {BRANCH_COLUMNS} FROM branches");
        if !include_retired {
            sql.push_str(" WHERE lifecycle_status='active'");
        }
        sql.push_str(" ORDER BY created_at_ms ASC, rowid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(RawBranchRow::read(row)?.into_record()?);
        }
        Ok(out)
    }
}
