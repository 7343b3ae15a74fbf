#![forbid(unsafe_code)]

use super::super::*;
use super::MergeRecord;
use rusqlite::types::Value as SqlValue;
use rusqlite::params_from_iter;
use tl_core::{BranchName, MergeStrategy};

impl SqliteStore {
    /// Merge audit rows, oldest first, optionally for one branch.
    pub fn list_merge_records(&self, branch: Option<&str>) -> Result<Vec<MergeRecord>, StoreError> {
        let mut sql = String::from(
            "SELECT merge_id, branch, base_branch, strategy, creates, updates, deletes, \
             conflicts_overridden, conflicts_skipped, financial_impact, merged_by, created_at_ms \
             FROM merge_records",
        );
        let mut sql_params = Vec::new();
        if let Some(branch) = branch {
            let branch = parse_branch(branch)?;
            sql.push_str(" WHERE branch=?");
            sql_params.push(SqlValue::Text(branch.into_string()));
        }
        sql.push_str(" ORDER BY merge_id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(sql_params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let branch: String = row.get(1)?;
            let base_branch: String = row.get(2)?;
            let strategy: String = row.get(3)?;
            out.push(MergeRecord {
                merge_id: row.get(0)?,
                branch: BranchName::try_new(branch)
                    .map_err(|_| StoreError::InvalidInput("invalid merge branch row"))?,
                base_branch: BranchName::try_new(base_branch)
                    .map_err(|_| StoreError::InvalidInput("invalid merge base_branch row"))?,
                strategy: MergeStrategy::parse(&strategy)
                    .map_err(|_| StoreError::InvalidInput("invalid merge strategy row"))?,
                creates: count(row.get(4)?),
                updates: count(row.get(5)?),
                deletes: count(row.get(6)?),
                conflicts_overridden: count(row.get(7)?),
                conflicts_skipped: count(row.get(8)?),
                financial_impact: row.get(9)?,
                merged_by: row.get(10)?,
                created_at_ms: row.get(11)?,
            });
        }
        Ok(out)
    }
}

fn count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}
