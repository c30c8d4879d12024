//! # Errors
//!
//! Every fatal condition of an aggregation run. A cancelled run is an
//! [`AggregationOutcome`](crate::analysis::AggregationOutcome), not an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Error, Debug)]
pub enum StatsError {
    /// The repository could not be opened or the branch does not exist.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Accessor output did not match the `name#email#date` record shape.
    #[error("Malformed commit {id}: {reason}")]
    MalformedCommit { id: String, reason: String },

    /// The accessor call failed or timed out.
    #[error("Accessor error for commit {id}: {reason}")]
    Accessor { id: String, reason: String },

    /// A worker task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StatsError {
    pub fn malformed(id: &str, reason: impl Into<String>) -> Self {
        StatsError::MalformedCommit {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn accessor(id: &str, reason: impl Into<String>) -> Self {
        StatsError::Accessor {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StatsError::Accessor { .. })
    }
}

impl From<git2::Error> for StatsError {
    fn from(err: git2::Error) -> Self {
        StatsError::Repository(err.message().to_string())
    }
}

impl From<toml::de::Error> for StatsError {
    fn from(err: toml::de::Error) -> Self {
        StatsError::Config(err.to_string())
    }
}
