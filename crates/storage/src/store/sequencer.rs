#![forbid(unsafe_code)]

use super::support::{next_version_tx, parse_branch};
use super::{SqliteStore, StoreError};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tl_core::LogicalId;

impl SqliteStore {
    /// Version the next write to `(logical_id, branch)` would receive.
    pub fn get_next_version(&self, logical_id: &str, branch: &str) -> Result<i64, StoreError> {
        let logical_id = LogicalId::try_new(logical_id)?;
        let branch = parse_branch(branch)?;
        next_version_tx(&self.conn, logical_id.as_str(), branch.as_str())
    }

    /// Runs `body` inside one IMMEDIATE transaction, so the write lock is held
    /// from the first read. Transient failures (busy database, a version
    /// number taken by a concurrent writer) roll back and re-run `body` up to
    /// `retry_attempts` times in total.
    pub(in crate::store) fn write_tx<T>(
        &mut self,
        op: &'static str,
        mut body: impl FnMut(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let attempts = self.config.retry_attempts;
        let mut attempt = 1;
        loop {
            match run_once(&mut self.conn, &mut body) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    tracing::warn!(op, attempt, error = %err, "transient write failure, retrying");
                    std::thread::sleep(self.config.backoff(attempt));
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(op, attempt, error = %err, "write retries exhausted");
                    return Err(StoreError::SerializationRetry { attempts: attempt });
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn run_once<T>(
    conn: &mut Connection,
    body: &mut impl FnMut(&Transaction<'_>) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = body(&tx)?;
    tx.commit()?;
    Ok(value)
}
