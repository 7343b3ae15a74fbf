#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }

    pub fn message(&self) -> &'static str {
        match self.field {
            "status" => "status must be active|deleted|merged|archived",
            "kind" => {
                "kind must be project|wbe|cost_element|change_order|cost_registration|forecast"
            }
            "view_mode" => "view_mode must be merged|branch_only",
            "strategy" => "strategy must be theirs|ours|manual",
            "lifecycle_status" => "lifecycle_status must be active|merged|deleted",
            _ => "unknown enum value",
        }
    }
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (got {:?})", self.message(), self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// Lifecycle status of a single record version. Deletion is a recorded
/// version, never a removed row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Deleted,
    Merged,
    Archived,
}

impl EntityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Deleted => "deleted",
            EntityStatus::Merged => "merged",
            EntityStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value.trim() {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            "merged" => Ok(Self::Merged),
            "archived" => Ok(Self::Archived),
            other => Err(ParseEnumError::new("status", other)),
        }
    }

    pub fn is_deleted(self) -> bool {
        matches!(self, EntityStatus::Deleted)
    }
}

/// Closed set of versionable business record types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Wbe,
    CostElement,
    ChangeOrder,
    CostRegistration,
    Forecast,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Project,
        EntityKind::Wbe,
        EntityKind::CostElement,
        EntityKind::ChangeOrder,
        EntityKind::CostRegistration,
        EntityKind::Forecast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Wbe => "wbe",
            EntityKind::CostElement => "cost_element",
            EntityKind::ChangeOrder => "change_order",
            EntityKind::CostRegistration => "cost_registration",
            EntityKind::Forecast => "forecast",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
            .ok_or_else(|| ParseEnumError::new("kind", value))
    }

    /// Payload fields holding money, summed into the financial impact of a
    /// branch delta.
    pub fn monetary_fields(self) -> &'static [&'static str] {
        match self {
            EntityKind::Project => &["budget", "contract_value"],
            EntityKind::Wbe => &["budget_allocation", "revenue_allocation"],
            EntityKind::CostElement => &["budget_amount", "revenue_plan"],
            EntityKind::ChangeOrder => &["amount"],
            EntityKind::CostRegistration => &["amount"],
            EntityKind::Forecast => &["estimate_at_completion"],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
