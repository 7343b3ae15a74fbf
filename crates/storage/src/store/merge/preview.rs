#![forbid(unsafe_code)]

use super::super::*;
use super::{MergePreview, conflicts_of, plan_against_tx};
use tl_core::{BranchDelta, BranchLifecycle, BranchName, MergeStrategy};

impl SqliteStore {
    /// What [`Self::merge_branch`] would do with `strategy`, without writing.
    pub fn preview_merge(
        &self,
        branch: &str,
        strategy: MergeStrategy,
    ) -> Result<MergePreview, StoreError> {
        let branch = parse_branch(branch)?;
        let trunk = BranchName::trunk();

        let tx = self.conn.unchecked_transaction()?;
        let record = require_branch_tx(&tx, branch.as_str())?;
        match record.lifecycle_status {
            BranchLifecycle::Merged => {
                return Err(StoreError::AlreadyMerged {
                    branch: branch.as_str().to_string(),
                    merged_at_ms: record.merged_at_ms,
                });
            }
            BranchLifecycle::Deleted => {
                return Err(StoreError::BranchNotFound {
                    branch: branch.as_str().to_string(),
                });
            }
            BranchLifecycle::Active => {}
        }
        let (plans, unchanged) = plan_against_tx(&tx, &branch, &trunk)?;
        tx.finish()?;

        let conflicts = conflicts_of(&plans);
        let refused = strategy == MergeStrategy::Manual && !conflicts.is_empty();
        let mut delta = BranchDelta::new(branch, trunk);
        if !refused {
            for plan in plans {
                if plan.resolution(strategy).is_some() {
                    delta.push(plan.item);
                }
            }
        }
        delta.summary.unchanged = unchanged;

        Ok(MergePreview {
            strategy,
            delta,
            conflicts,
            refused,
        })
    }
}
