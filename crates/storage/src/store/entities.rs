#![forbid(unsafe_code)]

use super::*;
use serde_json::Value;

mod create;
mod delete;
mod read;
mod typed;
mod update;

fn require_author(author: &str) -> Result<&str, StoreError> {
    let author = author.trim();
    if author.is_empty() {
        return Err(StoreError::InvalidInput("author must not be empty"));
    }
    Ok(author)
}

fn require_object(payload: &Value) -> Result<(), StoreError> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(StoreError::InvalidInput("payload must be a JSON object"))
    }
}

fn not_found(logical_id: &str, branch: &str) -> StoreError {
    StoreError::NotFound {
        logical_id: logical_id.to_string(),
        branch: branch.to_string(),
    }
}
