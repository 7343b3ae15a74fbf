#![forbid(unsafe_code)]

use super::super::*;
use tl_core::{BranchContext, DecodeError, Entity, VersionedPayload, VersionedRecord};

impl SqliteStore {
    pub fn create_typed<T: VersionedPayload>(
        &mut self,
        logical_id: &str,
        branch: &str,
        payload: &T,
        author: &str,
    ) -> Result<Entity<T>, StoreError> {
        let value = serde_json::to_value(payload)?;
        let record = self.create_entity(logical_id, T::KIND, branch, value, author)?;
        decode(record)
    }

    pub fn get_typed<T: VersionedPayload>(
        &self,
        ctx: &BranchContext,
        logical_id: &str,
    ) -> Result<Option<Entity<T>>, StoreError> {
        self.get_entity(ctx, logical_id, false)?
            .map(decode::<T>)
            .transpose()
    }

    /// Every visible record of `T`'s kind.
    pub fn list_typed<T: VersionedPayload>(
        &self,
        ctx: &BranchContext,
        include_deleted: bool,
    ) -> Result<Vec<Entity<T>>, StoreError> {
        self.list_entities(ctx, Some(T::KIND), include_deleted)?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }
}

fn decode<T: VersionedPayload>(record: VersionedRecord) -> Result<Entity<T>, StoreError> {
    let logical_id = record.logical_id.as_str().to_string();
    record.decode().map_err(|err| match err {
        DecodeError::KindMismatch { expected, actual } => StoreError::KindMismatch {
            logical_id,
            expected,
            actual,
        },
        DecodeError::Payload(err) => StoreError::Json(err),
    })
}
