#![forbid(unsafe_code)]

//! Domain types for versioned, branch-isolated business records.

pub mod branch;
pub mod context;
pub mod entity;
pub mod events;
pub mod ids;
pub mod kinds;
pub mod merge;
pub mod patch;

pub use branch::{BranchLifecycle, BranchLock, BranchRecord};
pub use context::{BranchContext, ContextGuard, ViewMode};
pub use entity::{DecodeError, Entity, VersionedPayload, VersionedRecord};
pub use events::{BranchEvent, BranchEventType, MemorySink, NotificationSink, NotifyError};
pub use ids::{BranchName, BranchNameError, LogicalId, LogicalIdError, TRUNK_BRANCH};
pub use kinds::{EntityKind, EntityStatus, ParseEnumError};
pub use merge::{
    BranchDelta, ChangeItem, ChangeKind, DeltaSummary, MergeConflict, MergeStrategy,
    PlannedChange,
};
