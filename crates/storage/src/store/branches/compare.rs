#![forbid(unsafe_code)]

use super::super::merge::plan_against_tx;
use super::super::*;
use tl_core::BranchDelta;

impl SqliteStore {
    /// Classifies every record touched in `branch` against `base_branch`
    /// (normally trunk). Read-only; the snapshot is taken in one transaction.
    pub fn compare_branches(
        &self,
        branch: &str,
        base_branch: &str,
    ) -> Result<BranchDelta, StoreError> {
        let branch = parse_branch(branch)?;
        let base_branch = parse_branch(base_branch)?;
        if branch == base_branch {
            return Err(StoreError::InvalidInput(
                "branch and base_branch must differ",
            ));
        }

        let tx = self.conn.unchecked_transaction()?;
        require_readable_branch_tx(&tx, branch.as_str())?;
        require_readable_branch_tx(&tx, base_branch.as_str())?;
        let (plans, unchanged) = plan_against_tx(&tx, &branch, &base_branch)?;
        tx.finish()?;

        let mut delta = BranchDelta::new(branch, base_branch);
        for plan in plans {
            delta.push(plan.item);
        }
        delta.summary.unchanged = unchanged;
        Ok(delta)
    }
}
