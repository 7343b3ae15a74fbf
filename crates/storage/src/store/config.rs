#![forbid(unsafe_code)]

use super::StoreError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tl_core::BranchName;

const ENV_PREFIX: &str = "TRUNKLINE_";

/// Engine tuning. Every field has a default, so an empty TOML document is a
/// valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub db_file_name: String,
    pub busy_timeout_ms: u64,
    /// Attempts per write transaction, including the first one.
    pub retry_attempts: u32,
    /// Backoff before retry `n` is `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
    pub merge_batch_size: usize,
    pub branch_prefix: String,
    pub branch_suffix_width: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_file_name: "trunkline.db".to_string(),
            busy_timeout_ms: 5_000,
            retry_attempts: 3,
            retry_backoff_ms: 20,
            merge_batch_size: 200,
            branch_prefix: "co-".to_string(),
            branch_suffix_width: 3,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, StoreError> {
        let config: Self =
            toml::from_str(raw).map_err(|err| StoreError::Config(err.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Applies `TRUNKLINE_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, StoreError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by full variable name, e.g.
    /// `TRUNKLINE_MERGE_BATCH_SIZE`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StoreError> {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = get("DB_FILE_NAME") {
            self.db_file_name = value;
        }
        if let Some(value) = get("BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = parse_number("BUSY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("RETRY_ATTEMPTS") {
            self.retry_attempts = parse_number("RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = get("RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = parse_number("RETRY_BACKOFF_MS", &value)?;
        }
        if let Some(value) = get("MERGE_BATCH_SIZE") {
            self.merge_batch_size = parse_number("MERGE_BATCH_SIZE", &value)?;
        }
        if let Some(value) = get("BRANCH_PREFIX") {
            self.branch_prefix = value;
        }
        if let Some(value) = get("BRANCH_SUFFIX_WIDTH") {
            self.branch_suffix_width = parse_number("BRANCH_SUFFIX_WIDTH", &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let file = self.db_file_name.trim();
        if file.is_empty() || file.contains(['/', '\\']) {
            return Err(StoreError::Config(
                "db_file_name must be a bare file name".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(StoreError::Config(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.merge_batch_size == 0 {
            return Err(StoreError::Config(
                "merge_batch_size must be at least 1".to_string(),
            ));
        }
        if self.branch_suffix_width > 12 {
            return Err(StoreError::Config(
                "branch_suffix_width must be at most 12".to_string(),
            ));
        }
        BranchName::sequenced(&self.branch_prefix, 1, self.branch_suffix_width).map_err(|err| {
            StoreError::Config(format!("branch_prefix yields invalid names: {err}"))
        })?;
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, StoreError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| StoreError::Config(format!("{ENV_PREFIX}{name} must be a number")))
}
