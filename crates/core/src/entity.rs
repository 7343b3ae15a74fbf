#![forbid(unsafe_code)]

use crate::ids::{BranchName, LogicalId};
use crate::kinds::{EntityKind, EntityStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Binds a payload type to the entity kind it is stored as.
pub trait VersionedPayload: Serialize + DeserializeOwned {
    const KIND: EntityKind;
}

/// One immutable version of a logical record, wrapping a domain payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity<T> {
    pub logical_id: LogicalId,
    pub kind: EntityKind,
    pub branch: BranchName,
    pub version: i64,
    pub status: EntityStatus,
    pub payload: T,
    pub created_at_ms: i64,
    pub created_by: String,
    /// Trunk version this branch chain last observed; `None` on trunk and
    /// for records first created inside a branch.
    pub base_main_version: Option<i64>,
}

/// Storage-level shape: the payload is an opaque JSON document.
pub type VersionedRecord = Entity<Value>;

#[derive(Debug)]
pub enum DecodeError {
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },
    Payload(serde_json::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KindMismatch { expected, actual } => {
                write!(f, "kind mismatch (expected={expected}, actual={actual})")
            }
            Self::Payload(err) => write!(f, "payload: {err}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl<T> Entity<T> {
    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }

    pub fn map_payload<U>(self, f: impl FnOnce(T) -> U) -> Entity<U> {
        Entity {
            logical_id: self.logical_id,
            kind: self.kind,
            branch: self.branch,
            version: self.version,
            status: self.status,
            payload: f(self.payload),
            created_at_ms: self.created_at_ms,
            created_by: self.created_by,
            base_main_version: self.base_main_version,
        }
    }
}

impl VersionedRecord {
    pub fn decode<T: VersionedPayload>(mut self) -> Result<Entity<T>, DecodeError> {
        if self.kind != T::KIND {
            return Err(DecodeError::KindMismatch {
                expected: T::KIND,
                actual: self.kind,
            });
        }
        let payload = serde_json::from_value::<T>(self.payload.take())
            .map_err(DecodeError::Payload)?;
        Ok(self.map_payload(|_| payload))
    }

    /// Reads a numeric payload field; numbers and numeric strings count.
    pub fn amount(&self, field: &str) -> Option<f64> {
        match self.payload.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Sum of the kind's monetary fields; zero for deleted rows.
    pub fn monetary_total(&self) -> f64 {
        if self.is_deleted() {
            return 0.0;
        }
        self.kind
            .monetary_fields()
            .iter()
            .filter_map(|field| self.amount(field))
            .sum()
    }
}
