#![forbid(unsafe_code)]

use super::super::*;
use super::{MergeOutcome, conflicts_of, plan_against_tx};
use rusqlite::{Transaction, params};
use serde_json::json;
use tl_core::{
    BranchDelta, BranchEventType, BranchLifecycle, BranchName, EntityStatus, MergeStrategy,
};

impl SqliteStore {
    /// Lands `branch`'s delta on trunk and retires the branch, all in one
    /// transaction: either every resolved change lands or none does.
    ///
    /// `manual` refuses with [`StoreError::Conflict`] when trunk moved under
    /// any changed field; `theirs` lets the branch win those records and
    /// `ours` keeps trunk for them. A merged branch cannot be merged again.
    pub fn merge_branch(
        &mut self,
        branch: &str,
        strategy: MergeStrategy,
        merged_by: &str,
    ) -> Result<MergeOutcome, StoreError> {
        let branch = parse_branch(branch)?;
        if branch.is_trunk() {
            return Err(StoreError::ProtectedBranch {
                branch: branch.as_str().to_string(),
                action: "merged",
            });
        }
        let merged_by = merged_by.trim();
        if merged_by.is_empty() {
            return Err(StoreError::InvalidInput("merged_by must not be empty"));
        }
        let batch_size = self.config.merge_batch_size;

        let (outcome, recipients) = self.write_tx("merge_branch", |tx| {
            let record = require_branch_tx(tx, branch.as_str())?;
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

            let trunk = BranchName::trunk();
            let (plans, _) = plan_against_tx(tx, &branch, &trunk)?;
            if strategy == MergeStrategy::Manual {
                let conflicts = conflicts_of(&plans);
                if !conflicts.is_empty() {
                    return Err(StoreError::Conflict {
                        branch: branch.as_str().to_string(),
                        conflicts,
                    });
                }
            }

            let mut applied = BranchDelta::new(branch.clone(), trunk.clone());
            let mut conflicts_overridden = Vec::new();
            let mut conflicts_skipped = Vec::new();
            for chunk in plans.chunks(batch_size) {
                for plan in chunk {
                    let Some((payload, status)) = plan.resolution(strategy) else {
                        conflicts_skipped.extend(plan.conflict.clone());
                        continue;
                    };
                    conflicts_overridden.extend(plan.conflict.clone());
                    insert_version_tx(
                        tx,
                        NewVersion {
                            logical_id: &plan.item.logical_id,
                            kind: plan.item.kind,
                            branch: &trunk,
                            status,
                            payload,
                            base_main_version: None,
                            created_by: merged_by,
                        },
                    )?;
                    applied.push(plan.item.clone());
                }
                tracing::debug!(branch = branch.as_str(), items = chunk.len(), "merge batch applied");
            }

            retire_branch_rows_tx(tx, &branch, merged_by)?;
            let merged_at_ms = now_ms();
            tx.execute(
                r#"
                UPDATE branches
                SET lifecycle_status=?2, merged_at_ms=?3, updated_at_ms=?3,
                    locked_by=NULL, lock_reason=NULL, locked_at_ms=NULL
                WHERE name=?1
                "#,
                params![
                    branch.as_str(),
                    BranchLifecycle::Merged.as_str(),
                    merged_at_ms
                ],
            )?;

            let summary = &applied.summary;
            tx.execute(
                r#"
                INSERT INTO merge_records(
                  branch, base_branch, strategy, creates, updates, deletes,
                  conflicts_overridden, conflicts_skipped, financial_impact, merged_by, created_at_ms
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    branch.as_str(),
                    trunk.as_str(),
                    strategy.as_str(),
                    summary.creates as i64,
                    summary.updates as i64,
                    summary.deletes as i64,
                    conflicts_overridden.len() as i64,
                    conflicts_skipped.len() as i64,
                    summary.financial_impact,
                    merged_by,
                    merged_at_ms
                ],
            )?;
            let merge_id = tx.last_insert_rowid();

            let mut recipients = vec![record.created_by.clone()];
            if merged_by != record.created_by {
                recipients.push(merged_by.to_string());
            }
            Ok((
                MergeOutcome {
                    merge_id,
                    strategy,
                    applied,
                    conflicts_overridden,
                    conflicts_skipped,
                    merged_at_ms,
                },
                recipients,
            ))
        })?;

        let summary = &outcome.applied.summary;
        tracing::info!(
            branch = branch.as_str(),
            strategy = strategy.as_str(),
            creates = summary.creates,
            updates = summary.updates,
            deletes = summary.deletes,
            overridden = outcome.conflicts_overridden.len(),
            skipped = outcome.conflicts_skipped.len(),
            "branch merged"
        );
        self.notify_event(
            BranchEventType::MergeCompleted,
            &branch,
            format!(
                "branch {branch} merged into main by {merged_by}: {} created, {} updated, {} deleted",
                summary.creates, summary.updates, summary.deletes
            ),
            recipients,
            json!({
                "merge_id": outcome.merge_id,
                "strategy": strategy.as_str(),
                "creates": summary.creates,
                "updates": summary.updates,
                "deletes": summary.deletes,
                "conflicts_overridden": outcome.conflicts_overridden.len(),
                "conflicts_skipped": outcome.conflicts_skipped.len(),
                "financial_impact": summary.financial_impact,
            }),
        );
        Ok(outcome)
    }
}

/// Marks the branch's live rows `merged`; deletion markers stay as they are.
fn retire_branch_rows_tx(
    tx: &Transaction<'_>,
    branch: &BranchName,
    merged_by: &str,
) -> Result<(), StoreError> {
    for row in current_rows_for_branch_tx(tx, branch.as_str(), false)? {
        insert_version_tx(
            tx,
            NewVersion {
                logical_id: &row.logical_id,
                kind: row.kind,
                branch,
                status: EntityStatus::Merged,
                payload: &row.payload,
                base_main_version: row.base_main_version,
                created_by: merged_by,
            },
        )?;
    }
    Ok(())
}
