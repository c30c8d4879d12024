//! Configuration for an aggregation run.
//!
//! Values come from, in increasing priority: defaults, a TOML file, CLI flags.

use crate::error::{Result, StatsError};
use crate::report::{OutputFormat, SortBy};
use crate::types::CollateBy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool size; `None` derives it from the host
    pub workers: Option<usize>,

    /// Per-extraction timeout in seconds
    pub timeout_secs: u64,

    /// Extra attempts after a failed accessor call
    pub retries: u32,

    /// Base delay before the first retry, doubled for each further attempt
    pub retry_backoff_ms: u64,

    pub branch: String,
    pub collate_by: CollateBy,
    pub sort_by: SortBy,
    pub output: OutputFormat,
    pub alias_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: None,
            timeout_secs: 30,
            retries: 0,
            retry_backoff_ms: 200,
            branch: "master".to_string(),
            collate_by: CollateBy::default(),
            sort_by: SortBy::default(),
            output: OutputFormat::default(),
            alias_file: None,
        }
    }
}

impl Config {
    /// Load from an explicit file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StatsError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(toml::from_str(&text)?)
    }

    /// Load `<config dir>/authorstats/config.toml` if it exists, defaults otherwise.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("authorstats").join("config.toml"))
    }

    /// Effective worker count, never below one.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count).max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Get optimal number of parallel workers based on system resources
pub fn default_worker_count() -> usize {
    let cpu_count = num_cpus::get();
    // Use 75% of available CPUs to leave room for other system processes
    (cpu_count * 3 / 4).max(1)
}
