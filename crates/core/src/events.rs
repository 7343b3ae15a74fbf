#![forbid(unsafe_code)]

use crate::ids::BranchName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchEventType {
    BranchCreated,
    BranchCloned,
    BranchLocked,
    BranchUnlocked,
    BranchDeleted,
    BranchPurged,
    MergeCompleted,
}

impl BranchEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchEventType::BranchCreated => "branch_created",
            BranchEventType::BranchCloned => "branch_cloned",
            BranchEventType::BranchLocked => "branch_locked",
            BranchEventType::BranchUnlocked => "branch_unlocked",
            BranchEventType::BranchDeleted => "branch_deleted",
            BranchEventType::BranchPurged => "branch_purged",
            BranchEventType::MergeCompleted => "merge_completed",
        }
    }
}

/// Description of a branch lifecycle event. The engine only builds these;
/// delivery belongs to a [`NotificationSink`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchEvent {
    pub event_type: BranchEventType,
    pub branch: BranchName,
    pub message: String,
    pub recipients: Vec<String>,
    pub context: Value,
    pub ts_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification delivery failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Fire-and-forget delivery of branch events. A failing sink never fails the
/// operation that produced the event.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &BranchEvent) -> Result<(), NotifyError>;
}

/// Keeps every delivered event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BranchEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BranchEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, event: &BranchEvent) -> Result<(), NotifyError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| NotifyError("memory sink poisoned".to_string()))?;
        events.push(event.clone());
        Ok(())
    }
}
