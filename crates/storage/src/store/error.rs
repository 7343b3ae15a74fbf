#![forbid(unsafe_code)]

use super::support::format_ts_ms;
use rusqlite::ErrorCode;
use tl_core::{BranchNameError, EntityKind, LogicalIdError, MergeConflict};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid branch name {name:?}: {reason}")]
    InvalidBranchName {
        name: String,
        reason: BranchNameError,
    },
    #[error("invalid logical id: {0}")]
    InvalidLogicalId(LogicalIdError),
    #[error("no current row for {logical_id} on {branch}")]
    NotFound { logical_id: String, branch: String },
    #[error("logical id {logical_id} already exists on {branch}")]
    DuplicateLogicalId { logical_id: String, branch: String },
    #[error("{logical_id} on {branch} is not deleted")]
    NotDeleted { logical_id: String, branch: String },
    #[error("{logical_id} is a {actual}, not a {expected}")]
    KindMismatch {
        logical_id: String,
        expected: EntityKind,
        actual: EntityKind,
    },
    #[error("branch {branch} not found")]
    BranchNotFound { branch: String },
    #[error("branch {branch} already exists")]
    BranchAlreadyExists { branch: String },
    #[error("branch {branch} is already merged")]
    AlreadyMerged {
        branch: String,
        merged_at_ms: Option<i64>,
    },
    #[error("branch {branch} is locked by {locked_by} since {}: {reason}", locked_since(.locked_at_ms))]
    BranchLocked {
        branch: String,
        locked_by: String,
        reason: String,
        locked_at_ms: i64,
    },
    #[error("branch {branch} is protected and cannot be {action}")]
    ProtectedBranch {
        branch: String,
        action: &'static str,
    },
    #[error("merge of {branch} refused: {} unresolved conflict(s)", .conflicts.len())]
    Conflict {
        branch: String,
        conflicts: Vec<MergeConflict>,
    },
    #[error("concurrent write did not settle after {attempts} attempt(s)")]
    SerializationRetry { attempts: u32 },
}

impl StoreError {
    /// Store-level races worth retrying locally: busy/locked database and a
    /// version number taken by a concurrent writer.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SerializationRetry { .. } => true,
            Self::Sql(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Branch lifecycle failures the caller should render with specific
    /// guidance rather than as a generic error.
    pub fn is_branch_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::BranchNotFound { .. }
                | Self::BranchAlreadyExists { .. }
                | Self::AlreadyMerged { .. }
                | Self::BranchLocked { .. }
                | Self::ProtectedBranch { .. }
        )
    }
}

impl From<LogicalIdError> for StoreError {
    fn from(value: LogicalIdError) -> Self {
        Self::InvalidLogicalId(value)
    }
}

fn locked_since(locked_at_ms: &i64) -> String {
    format_ts_ms(*locked_at_ms)
}
