#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub const TRUNK_BRANCH: &str = "main";

const MAX_BRANCH_NAME_LEN: usize = 64;
const MAX_LOGICAL_ID_LEN: usize = 128;

/// Stable identity of a business record. Shared by every version of the
/// record and by every branch that has ever held a copy of it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalId(String);

impl LogicalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, LogicalIdError> {
        let value = value.into();
        validate_logical_id(&value)?;
        Ok(Self(value))
    }
}

impl std::fmt::Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LogicalId {
    type Error = LogicalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<LogicalId> for String {
    fn from(value: LogicalId) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogicalIdError {
    Empty,
    TooLong,
    SurroundingWhitespace,
    ContainsControl,
}

impl LogicalIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "logical_id must not be empty",
            Self::TooLong => "logical_id is too long",
            Self::SurroundingWhitespace => "logical_id must not start or end with whitespace",
            Self::ContainsControl => "logical_id contains control characters",
        }
    }
}

impl std::fmt::Display for LogicalIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for LogicalIdError {}

fn validate_logical_id(value: &str) -> Result<(), LogicalIdError> {
    if value.is_empty() {
        return Err(LogicalIdError::Empty);
    }
    if value.len() > MAX_LOGICAL_ID_LEN {
        return Err(LogicalIdError::TooLong);
    }
    if value.trim() != value {
        return Err(LogicalIdError::SurroundingWhitespace);
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(LogicalIdError::ContainsControl);
    }
    Ok(())
}

/// Name of a workspace of record versions. `main` is the trunk; every other
/// name is human-issued and follows `[a-z][a-z0-9]*(-[a-z0-9]+)*`, e.g.
/// `co-001`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    pub fn trunk() -> Self {
        Self(TRUNK_BRANCH.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_trunk(&self) -> bool {
        self.0 == TRUNK_BRANCH
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, BranchNameError> {
        let value = value.into();
        validate_branch_name(&value)?;
        Ok(Self(value))
    }

    /// Builds `<prefix><n>` with `n` zero-padded to `width` digits.
    pub fn sequenced(prefix: &str, n: i64, width: usize) -> Result<Self, BranchNameError> {
        Self::try_new(format!("{prefix}{n:0width$}"))
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = BranchNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<BranchName> for String {
    fn from(value: BranchName) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchNameError {
    Empty,
    TooLong,
    InvalidFirstChar,
    InvalidChar { ch: char, index: usize },
    DanglingHyphen,
}

impl BranchNameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "branch name must not be empty",
            Self::TooLong => "branch name is too long",
            Self::InvalidFirstChar => "branch name must start with a lowercase letter",
            Self::InvalidChar { .. } => {
                "branch name may only contain lowercase letters, digits and '-'"
            }
            Self::DanglingHyphen => "branch name must not end with '-' or contain '--'",
        }
    }
}

impl std::fmt::Display for BranchNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidChar { ch, index } => {
                write!(f, "{} (found {ch:?} at {index})", self.message())
            }
            _ => f.write_str(self.message()),
        }
    }
}

impl std::error::Error for BranchNameError {}

fn validate_branch_name(value: &str) -> Result<(), BranchNameError> {
    if value.is_empty() {
        return Err(BranchNameError::Empty);
    }
    if value.len() > MAX_BRANCH_NAME_LEN {
        return Err(BranchNameError::TooLong);
    }
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(BranchNameError::Empty);
    };
    if !first.is_ascii_lowercase() {
        return Err(BranchNameError::InvalidFirstChar);
    }
    for (index, ch) in value.chars().enumerate().skip(1) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            continue;
        }
        return Err(BranchNameError::InvalidChar { ch, index });
    }
    if value.ends_with('-') || value.contains("--") {
        return Err(BranchNameError::DanglingHyphen);
    }
    Ok(())
}
