#![forbid(unsafe_code)]

use crate::ids::BranchName;
use crate::kinds::ParseEnumError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchLifecycle {
    Active,
    Merged,
    Deleted,
}

impl BranchLifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchLifecycle::Active => "active",
            BranchLifecycle::Merged => "merged",
            BranchLifecycle::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value.trim() {
            "active" => Ok(Self::Active),
            "merged" => Ok(Self::Merged),
            "deleted" => Ok(Self::Deleted),
            other => Err(ParseEnumError {
                field: "lifecycle_status",
                value: other.to_string(),
            }),
        }
    }
}

/// Persisted cooperative write lock. Blocks future writes, never reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchLock {
    pub locked_by: String,
    pub reason: String,
    pub locked_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub name: BranchName,
    /// `None` only for the trunk itself.
    pub base_branch: Option<BranchName>,
    pub owner_reference: Option<String>,
    pub created_by: String,
    pub lock: Option<BranchLock>,
    pub lifecycle_status: BranchLifecycle,
    pub created_at_ms: i64,
    pub merged_at_ms: Option<i64>,
}

impl BranchRecord {
    pub fn is_trunk(&self) -> bool {
        self.name.is_trunk()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle_status == BranchLifecycle::Active
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }
}
