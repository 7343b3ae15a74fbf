#![forbid(unsafe_code)]

use super::super::*;
use super::{generate_branch_name_tx, insert_branch_tx, recipients, require_actor};
use serde_json::json;
use tl_core::{BranchEventType, BranchRecord};

impl SqliteStore {
    /// Creates an empty branch off trunk with a generated name such as
    /// `co-001`.
    pub fn create_branch(
        &mut self,
        owner_reference: Option<&str>,
        created_by: &str,
    ) -> Result<BranchRecord, StoreError> {
        let created_by = require_actor(created_by)?;
        let prefix = self.config.branch_prefix.clone();
        let width = self.config.branch_suffix_width;

        let record = self.write_tx("create_branch", |tx| {
            let name = generate_branch_name_tx(tx, &prefix, width)?;
            insert_branch_tx(tx, &name, owner_reference, created_by)
        })?;
        self.announce_created(&record);
        Ok(record)
    }

    /// Creates an empty branch off trunk under a caller-chosen name.
    pub fn create_branch_named(
        &mut self,
        name: &str,
        owner_reference: Option<&str>,
        created_by: &str,
    ) -> Result<BranchRecord, StoreError> {
        let name = parse_branch(name)?;
        let created_by = require_actor(created_by)?;

        let record = self.write_tx("create_branch_named", |tx| {
            insert_branch_tx(tx, &name, owner_reference, created_by)
        })?;
        self.announce_created(&record);
        Ok(record)
    }

    fn announce_created(&self, record: &BranchRecord) {
        tracing::info!(
            branch = record.name.as_str(),
            owner_reference = record.owner_reference.as_deref(),
            "branch created"
        );
        self.notify_event(
            BranchEventType::BranchCreated,
            &record.name,
            format!("branch {} created by {}", record.name, record.created_by),
            recipients(record, &record.created_by),
            json!({ "owner_reference": record.owner_reference }),
        );
    }
}
