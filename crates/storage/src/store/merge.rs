#![forbid(unsafe_code)]

//! Merge engine: plans a branch's delta against trunk, detects conflicts
//! with trunk edits made since the fork point and lands the resolved delta
//! in one transaction.

use super::*;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tl_core::merge::plan_change;
use tl_core::{
    BranchDelta, BranchName, MergeConflict, MergeStrategy, PlannedChange, TRUNK_BRANCH,
};

mod apply;
mod preview;
mod records;

/// Result of a successful merge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub merge_id: i64,
    pub strategy: MergeStrategy,
    /// What actually landed on trunk.
    pub applied: BranchDelta,
    /// Conflicts where the branch side won (`theirs`).
    pub conflicts_overridden: Vec<MergeConflict>,
    /// Conflicts where trunk was kept (`ours`).
    pub conflicts_skipped: Vec<MergeConflict>,
    pub merged_at_ms: i64,
}

/// Dry run of [`SqliteStore::merge_branch`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergePreview {
    pub strategy: MergeStrategy,
    /// What would land on trunk with `strategy`.
    pub delta: BranchDelta,
    pub conflicts: Vec<MergeConflict>,
    /// `manual` with at least one conflict: the merge would be refused.
    pub refused: bool,
}

/// Audit row written by every merge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub merge_id: i64,
    pub branch: BranchName,
    pub base_branch: BranchName,
    pub strategy: MergeStrategy,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub conflicts_overridden: usize,
    pub conflicts_skipped: usize,
    pub financial_impact: f64,
    pub merged_by: String,
    pub created_at_ms: i64,
}

/// Plans every record with rows on `branch` against `base`. A record missing
/// on a non-trunk base is compared with trunk, matching the merged view.
/// Returns the plans and the number of records with nothing to apply.
pub(in crate::store) fn plan_against_tx(
    conn: &Connection,
    branch: &BranchName,
    base: &BranchName,
) -> Result<(Vec<PlannedChange>, usize), StoreError> {
    let rows = current_rows_for_branch_tx(conn, branch.as_str(), true)?;
    let mut plans = Vec::new();
    let mut unchanged = 0;

    for row in &rows {
        let id = row.logical_id.as_str();
        let base_row = match current_row_tx(conn, id, base.as_str())? {
            Some(found) => Some(found),
            None if !base.is_trunk() => current_row_tx(conn, id, TRUNK_BRANCH)?,
            None => None,
        };
        let observed = match (&base_row, row.base_main_version) {
            (Some(current), Some(version)) if current.branch.is_trunk() => {
                version_row_tx(conn, id, TRUNK_BRANCH, version)?
            }
            _ => None,
        };
        match plan_change(branch, row, base_row.as_ref(), observed.as_ref()) {
            Some(plan) => plans.push(plan),
            None => unchanged += 1,
        }
    }

    Ok((plans, unchanged))
}

fn conflicts_of(plans: &[PlannedChange]) -> Vec<MergeConflict> {
    plans
        .iter()
        .filter_map(|plan| plan.conflict.clone())
        .collect()
}
