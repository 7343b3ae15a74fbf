#![forbid(unsafe_code)]

use super::super::filter::fetch_current_tx;
use super::super::*;
use super::{generate_branch_name_tx, insert_branch_tx, protected, recipients, require_actor};
use serde_json::json;
use tl_core::{BranchContext, BranchEventType, BranchRecord, EntityStatus};

impl SqliteStore {
    /// Creates a branch holding version 1 of every record visible in the
    /// merged view of `source`. Logical ids are copied unchanged, so
    /// references between records stay intact.
    pub fn clone_branch(
        &mut self,
        source: &str,
        target: Option<&str>,
        created_by: &str,
    ) -> Result<(BranchRecord, usize), StoreError> {
        let source = parse_branch(source)?;
        let target = target.map(parse_branch).transpose()?;
        if let Some(target) = target.as_ref().filter(|name| name.is_trunk()) {
            return Err(protected(target, "cloned into"));
        }
        let created_by = require_actor(created_by)?;
        let prefix = self.config.branch_prefix.clone();
        let width = self.config.branch_suffix_width;

        let (record, copied) = self.write_tx("clone_branch", |tx| {
            let source_record = require_readable_branch_tx(tx, source.as_str())?;
            let name = match &target {
                Some(name) => name.clone(),
                None => generate_branch_name_tx(tx, &prefix, width)?,
            };
            let owner_reference = if source_record.is_trunk() {
                None
            } else {
                source_record.owner_reference.as_deref()
            };
            let record = insert_branch_tx(tx, &name, owner_reference, created_by)?;

            let visible = apply_status_filters(
                apply_branch_filters(VersionQuery::new(), &BranchContext::new(source.clone())),
                false,
            );
            let rows = fetch_current_tx(tx, &visible)?;
            for row in &rows {
                let base_main_version = if row.branch.is_trunk() {
                    Some(row.version)
                } else {
                    row.base_main_version
                };
                let status = match row.status {
                    EntityStatus::Merged => EntityStatus::Active,
                    other => other,
                };
                insert_version_tx(
                    tx,
                    NewVersion {
                        logical_id: &row.logical_id,
                        kind: row.kind,
                        branch: &name,
                        status,
                        payload: &row.payload,
                        base_main_version,
                        created_by,
                    },
                )?;
            }
            Ok((record, rows.len()))
        })?;

        tracing::info!(
            source = source.as_str(),
            branch = record.name.as_str(),
            copied,
            "branch cloned"
        );
        self.notify_event(
            BranchEventType::BranchCloned,
            &record.name,
            format!("branch {} cloned from {source} ({copied} records)", record.name),
            recipients(&record, created_by),
            json!({ "source": source.as_str(), "copied": copied }),
        );
        Ok((record, copied))
    }
}
