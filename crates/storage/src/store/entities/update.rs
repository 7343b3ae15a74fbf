#![forbid(unsafe_code)]

use super::super::*;
use super::{not_found, require_author, require_object};
use serde_json::Value;
use tl_core::patch::apply_merge_patch;
use tl_core::{LogicalId, VersionedRecord};

impl SqliteStore {
    /// Applies a JSON merge patch to the current payload and appends the
    /// result as the next version. Inside a branch, a record so far only on
    /// trunk is copied lazily: the branch chain starts at version 1 and
    /// remembers the trunk version it was taken from.
    pub fn update_entity_with_version(
        &mut self,
        logical_id: &str,
        branch: &str,
        patch: &Value,
        author: &str,
    ) -> Result<VersionedRecord, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        let branch = parse_branch(branch)?;
        let author = require_author(author)?;

        self.write_tx("update_entity_with_version", |tx| {
            require_writable_branch_tx(tx, branch.as_str())?;
            let (source, base_main_version) =
                write_source_tx(tx, logical_id.as_str(), &branch)?
                    .filter(|(row, _)| !row.is_deleted())
                    .ok_or_else(|| not_found(logical_id.as_str(), branch.as_str()))?;

            let mut payload = source.payload;
            apply_merge_patch(&mut payload, patch);
            require_object(&payload)?;

            insert_version_tx(
                tx,
                NewVersion {
                    logical_id: &logical_id,
                    kind: source.kind,
                    branch: &branch,
                    status: source.status,
                    payload: &payload,
                    base_main_version,
                    created_by: author,
                },
            )
        })
    }
}
