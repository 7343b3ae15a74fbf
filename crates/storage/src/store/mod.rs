#![forbid(unsafe_code)]

mod branches;
mod config;
mod entities;
mod error;
mod filter;
mod merge;
mod notify;
mod sequencer;
mod support;

pub use config::StoreConfig;
pub use error::StoreError;
pub use filter::{VersionQuery, apply_branch_filters, apply_status_filters};
pub use merge::{MergeOutcome, MergePreview, MergeRecord};
pub use notify::TracingSink;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use support::*;
use tl_core::{BranchEvent, NotificationSink};

/// The versioning engine over one SQLite database file.
///
/// Each instance owns its own connection; concurrent callers open their own
/// store on the same directory and the database serializes their writes.
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
    config: StoreConfig,
    sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("storage_dir", &self.storage_dir)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(storage_dir, StoreConfig::default())
    }

    pub fn open_with_config(
        storage_dir: impl AsRef<Path>,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        config.validate()?;
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(&config.db_file_name);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(config.busy_timeout())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;
        tracing::debug!(path = %db_path.display(), "store opened");

        Ok(Self {
            conn,
            storage_dir,
            config,
            sink: Arc::new(TracingSink),
        })
    }

    /// Replaces the notification collaborator (defaults to [`TracingSink`]).
    pub fn with_notifier(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Delivery is fire-and-forget: a failing sink never fails the caller.
    fn emit(&self, event: BranchEvent) {
        if let Err(err) = self.sink.notify(&event) {
            tracing::warn!(
                event = event.event_type.as_str(),
                branch = event.branch.as_str(),
                error = %err,
                "notification delivery failed"
            );
        }
    }
}
