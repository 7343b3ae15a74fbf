#![forbid(unsafe_code)]

use super::SqliteStore;
use super::support::now_ms;
use serde_json::Value;
use tl_core::{BranchEvent, BranchEventType, BranchName, NotificationSink, NotifyError};

/// Default collaborator: logs every event and never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: &BranchEvent) -> Result<(), NotifyError> {
        tracing::info!(
            event = event.event_type.as_str(),
            branch = event.branch.as_str(),
            recipients = ?event.recipients,
            context = %event.context,
            "{}",
            event.message
        );
        Ok(())
    }
}

impl SqliteStore {
    pub(in crate::store) fn notify_event(
        &self,
        event_type: BranchEventType,
        branch: &BranchName,
        message: String,
        recipients: Vec<String>,
        context: Value,
    ) {
        self.emit(BranchEvent {
            event_type,
            branch: branch.clone(),
            message,
            recipients,
            context,
            ts_ms: now_ms(),
        });
    }
}
