#![forbid(unsafe_code)]

//! Branch delta classification and trunk conflict detection.
//!
//! Everything here is pure: the storage layer gathers the rows inside its
//! merge transaction and hands them to [`plan_change`], which decides what
//! (if anything) lands on the base branch and whether it conflicts.

use crate::entity::VersionedRecord;
use crate::ids::{BranchName, LogicalId};
use crate::kinds::{EntityKind, EntityStatus, ParseEnumError};
use crate::patch::{WHOLE_PAYLOAD, changed_fields, overlay_fields};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Branch payload wins outright on conflict.
    Theirs,
    /// Trunk payload is kept on conflict; the branch change is dropped.
    Ours,
    /// Any conflict refuses the whole merge.
    #[default]
    Manual,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Theirs => "theirs",
            MergeStrategy::Ours => "ours",
            MergeStrategy::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value.trim() {
            "theirs" => Ok(Self::Theirs),
            "ours" => Ok(Self::Ours),
            "manual" => Ok(Self::Manual),
            other => Err(ParseEnumError {
                field: "strategy",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeItem {
    pub logical_id: LogicalId,
    pub kind: EntityKind,
    pub change: ChangeKind,
    pub branch_version: i64,
    /// Current version on the base branch, if the record exists there.
    pub base_version: Option<i64>,
    /// Base version the branch chain forked from.
    pub observed_base_version: Option<i64>,
    pub changed_fields: Vec<String>,
    /// The branch moved the record status (archived, restored, ...).
    pub status_changed: bool,
    pub financial_delta: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub unchanged: usize,
    pub financial_impact: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchDelta {
    pub branch: BranchName,
    pub base_branch: BranchName,
    pub creates: Vec<ChangeItem>,
    pub updates: Vec<ChangeItem>,
    pub deletes: Vec<ChangeItem>,
    pub summary: DeltaSummary,
}

impl BranchDelta {
    pub fn new(branch: BranchName, base_branch: BranchName) -> Self {
        Self {
            branch,
            base_branch,
            creates: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
            summary: DeltaSummary::default(),
        }
    }

    pub fn push(&mut self, item: ChangeItem) {
        self.summary.financial_impact += item.financial_delta;
        match item.change {
            ChangeKind::Create => {
                self.summary.creates += 1;
                self.creates.push(item);
            }
            ChangeKind::Update => {
                self.summary.updates += 1;
                self.updates.push(item);
            }
            ChangeKind::Delete => {
                self.summary.deletes += 1;
                self.deletes.push(item);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub conflict_id: String,
    pub logical_id: LogicalId,
    pub kind: EntityKind,
    pub change: ChangeKind,
    pub observed_base_version: Option<i64>,
    pub current_base_version: i64,
    pub branch_fields: Vec<String>,
    pub base_fields: Vec<String>,
    pub overlapping_fields: Vec<String>,
    /// Both sides moved the record status.
    pub status_overlap: bool,
}

/// Decision for one record touched in a branch.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedChange {
    pub item: ChangeItem,
    pub conflict: Option<MergeConflict>,
    /// Payload and status that land on the base branch when the branch side
    /// is taken without conflict.
    pub merged_payload: Value,
    pub merged_status: EntityStatus,
    /// Payload and status that land when the branch side wins a conflict.
    pub theirs_payload: Value,
    pub theirs_status: EntityStatus,
}

impl PlannedChange {
    /// What to write for `strategy`; `None` means nothing lands. Manual
    /// conflicts are filtered out by the caller before this is asked.
    pub fn resolution(&self, strategy: MergeStrategy) -> Option<(&Value, EntityStatus)> {
        match (&self.conflict, strategy) {
            (None, _) => Some((&self.merged_payload, self.merged_status)),
            (Some(_), MergeStrategy::Theirs) => Some((&self.theirs_payload, self.theirs_status)),
            (Some(_), MergeStrategy::Ours) | (Some(_), MergeStrategy::Manual) => None,
        }
    }
}

/// Classifies a branch's current row against the base branch's current row.
pub fn classify(
    branch_row: &VersionedRecord,
    base_row: Option<&VersionedRecord>,
) -> Option<ChangeKind> {
    match base_row {
        None if branch_row.is_deleted() => None,
        None => Some(ChangeKind::Create),
        Some(base) if branch_row.is_deleted() => {
            if base.is_deleted() {
                None
            } else {
                Some(ChangeKind::Delete)
            }
        }
        Some(base) => {
            if base.payload != branch_row.payload || base.status != branch_row.status {
                Some(ChangeKind::Update)
            } else {
                None
            }
        }
    }
}

/// Plans one record. `observed_base` is the base row at the version the
/// branch forked from (`branch_row.base_main_version`), when known.
pub fn plan_change(
    branch: &BranchName,
    branch_row: &VersionedRecord,
    base_row: Option<&VersionedRecord>,
    observed_base: Option<&VersionedRecord>,
) -> Option<PlannedChange> {
    let change = classify(branch_row, base_row)?;

    let base_total = base_row.map(VersionedRecord::monetary_total).unwrap_or(0.0);
    let financial_delta = branch_row.monetary_total() - base_total;

    let branch_side = branch_side_changes(branch_row, observed_base.or(base_row));
    // A copied row the branch never touched only differs because trunk moved.
    if change == ChangeKind::Update && observed_base.is_some() && branch_side.is_empty() {
        return None;
    }
    let mut conflict = None;
    let mut merged_payload = branch_row.payload.clone();
    let mut merged_status = branch_row.status;

    if let (Some(current), ChangeKind::Update | ChangeKind::Delete) = (base_row, change) {
        let observed_version = branch_row.base_main_version;
        let advanced = observed_version.is_none_or(|observed| current.version > observed);
        if advanced {
            let base_side = match observed_base {
                Some(observed) => Touched::between(observed, current),
                None => Touched::everything(),
            };
            let touched = match change {
                ChangeKind::Delete => Touched::everything(),
                _ => branch_side.clone(),
            };
            let overlapping = overlap(&touched.fields, &base_side.fields);
            let status_overlap = touched.status && base_side.status;
            if !overlapping.is_empty() || status_overlap {
                conflict = Some(MergeConflict {
                    conflict_id: conflict_id(
                        branch,
                        &branch_row.logical_id,
                        observed_version,
                        current.version,
                    ),
                    logical_id: branch_row.logical_id.clone(),
                    kind: branch_row.kind,
                    change,
                    observed_base_version: observed_version,
                    current_base_version: current.version,
                    branch_fields: touched.fields.into_iter().collect(),
                    base_fields: base_side.fields.into_iter().collect(),
                    overlapping_fields: overlapping.into_iter().collect(),
                    status_overlap,
                });
            } else if change == ChangeKind::Update {
                merged_payload =
                    overlay_fields(&current.payload, &branch_row.payload, &branch_side.fields);
                if !branch_side.status {
                    merged_status = current.status;
                }
            }
        }
    }

    let item = ChangeItem {
        logical_id: branch_row.logical_id.clone(),
        kind: branch_row.kind,
        change,
        branch_version: branch_row.version,
        base_version: base_row.map(|row| row.version),
        observed_base_version: branch_row.base_main_version,
        changed_fields: branch_side.fields.into_iter().collect(),
        status_changed: branch_side.status,
        financial_delta,
    };

    let (merged_payload, merged_status) = match change {
        ChangeKind::Delete => (
            base_row
                .map(|row| row.payload.clone())
                .unwrap_or_else(|| branch_row.payload.clone()),
            EntityStatus::Deleted,
        ),
        _ => (merged_payload, merged_status),
    };

    Some(PlannedChange {
        item,
        conflict,
        merged_payload,
        merged_status,
        theirs_payload: branch_row.payload.clone(),
        theirs_status: branch_row.status,
    })
}

/// `CONFLICT-<32 hex>`, stable for the same branch, record and trunk
/// versions.
pub fn conflict_id(
    branch: &BranchName,
    logical_id: &LogicalId,
    observed_base_version: Option<i64>,
    current_base_version: i64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(branch.as_str().as_bytes());
    hasher.update([0xff]);
    hasher.update(logical_id.as_str().as_bytes());
    hasher.update([0xff]);
    hasher.update(observed_base_version.unwrap_or(0).to_le_bytes());
    hasher.update(current_base_version.to_le_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(9 + 32);
    out.push_str("CONFLICT-");
    for byte in &digest[..16] {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// What one side changed: top-level payload fields, plus the record status
/// kept apart so a payload member that happens to be called `status` never
/// aliases it.
#[derive(Clone, Debug, Default)]
struct Touched {
    fields: BTreeSet<String>,
    status: bool,
}

impl Touched {
    fn everything() -> Self {
        Self {
            fields: BTreeSet::from([WHOLE_PAYLOAD.to_string()]),
            status: true,
        }
    }

    fn between(before: &VersionedRecord, after: &VersionedRecord) -> Self {
        if after.is_deleted() && !before.is_deleted() {
            return Self::everything();
        }
        Self {
            fields: changed_fields(&before.payload, &after.payload),
            status: before.status != after.status,
        }
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty() && !self.status
    }
}

fn branch_side_changes(
    branch_row: &VersionedRecord,
    reference: Option<&VersionedRecord>,
) -> Touched {
    match (reference, &branch_row.payload) {
        (Some(reference), _) => Touched::between(reference, branch_row),
        (None, Value::Object(members)) => Touched {
            fields: members.keys().cloned().collect(),
            status: false,
        },
        (None, _) => Touched {
            fields: BTreeSet::from([WHOLE_PAYLOAD.to_string()]),
            status: false,
        },
    }
}

fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> BTreeSet<String> {
    if a.is_empty() || b.is_empty() {
        return BTreeSet::new();
    }
    if a.contains(WHOLE_PAYLOAD) {
        return b.clone();
    }
    if b.contains(WHOLE_PAYLOAD) {
        return a.clone();
    }
    a.intersection(b).cloned().collect()
}
