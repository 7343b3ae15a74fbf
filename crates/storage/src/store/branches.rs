#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Transaction, params};
use tl_core::{BranchLifecycle, BranchName, BranchRecord};

mod clone;
mod compare;
mod create;
mod delete;
mod lock;
mod purge;
mod query;

const BRANCH_NAME_COUNTER: &str = "branch_name";

fn insert_branch_tx(
    tx: &Transaction<'_>,
    name: &BranchName,
    owner_reference: Option<&str>,
    created_by: &str,
) -> Result<BranchRecord, StoreError> {
    if branch_exists_tx(tx, name.as_str())? {
        return Err(StoreError::BranchAlreadyExists {
            branch: name.as_str().to_string(),
        });
    }
    let now_ms = now_ms();
    let base_branch = BranchName::trunk();
    tx.execute(
        r#"
        INSERT INTO branches(
          name, base_branch, owner_reference, created_by, lifecycle_status, created_at_ms, updated_at_ms
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        "#,
        params![
            name.as_str(),
            base_branch.as_str(),
            owner_reference,
            created_by,
            BranchLifecycle::Active.as_str(),
            now_ms
        ],
    )?;
    Ok(BranchRecord {
        name: name.clone(),
        base_branch: Some(base_branch),
        owner_reference: owner_reference.map(str::to_string),
        created_by: created_by.to_string(),
        lock: None,
        lifecycle_status: BranchLifecycle::Active,
        created_at_ms: now_ms,
        merged_at_ms: None,
    })
}

/// Next `<prefix><n>` name not already taken.
fn generate_branch_name_tx(
    tx: &Transaction<'_>,
    prefix: &str,
    width: usize,
) -> Result<BranchName, StoreError> {
    loop {
        let n = next_counter_tx(tx, BRANCH_NAME_COUNTER)?;
        let name = BranchName::sequenced(prefix, n, width).map_err(|reason| {
            StoreError::InvalidBranchName {
                name: format!("{prefix}{n:0width$}"),
                reason,
            }
        })?;
        if !branch_exists_tx(tx, name.as_str())? {
            return Ok(name);
        }
    }
}

fn require_actor(actor: &str) -> Result<&str, StoreError> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(StoreError::InvalidInput("actor must not be empty"));
    }
    Ok(actor)
}

fn protected(branch: &BranchName, action: &'static str) -> StoreError {
    StoreError::ProtectedBranch {
        branch: branch.as_str().to_string(),
        action,
    }
}

/// Branch creator and the acting user, without duplicates.
fn recipients(record: &BranchRecord, actor: &str) -> Vec<String> {
    let mut out = vec![record.created_by.clone()];
    if actor != record.created_by {
        out.push(actor.to_string());
    }
    out
}
