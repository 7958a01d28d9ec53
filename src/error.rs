//! Error types for the broker store migrator.
//!
//! Wrapping variants render the wrapped error inline and do not also expose it
//! as `source()`, so a chain renderer prints each message once.

use crate::types::RecordKind;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Store-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL error: {0}")]
    Sql(rusqlite::Error),

    #[error("MySQL error: {0}")]
    Mysql(sqlx::Error),

    /// The source database has never been created
    #[error("Database does not exist: {0}")]
    DatabaseMissing(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store I/O error: {0}")]
    Io(std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sql(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Failure classes a migration run can end in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// A store could not be reached or queried for its lifecycle flag
    Availability,
    /// Bulk retrieval from the source failed
    Read,
    /// A single create call against the destination failed
    Write,
    /// Activating the destination or retiring the source failed
    Transition,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Availability => "availability",
            FailureCategory::Read => "read",
            FailureCategory::Write => "write",
            FailureCategory::Transition => "transition",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Migration errors. Every variant is terminal for the current run.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Destination activation check failed: {0}")]
    DestinationUnavailable(StoreError),

    #[error("Source retirement check failed: {0}")]
    SourceUnavailable(StoreError),

    #[error("Failed to retrieve all {kind} details: {error}")]
    ReadFailed { kind: RecordKind, error: StoreError },

    #[error("Failed to create {kind} details for '{id}': {error}")]
    WriteFailed {
        kind: RecordKind,
        id: String,
        error: StoreError,
    },

    #[error("Failed to activate destination store: {0}")]
    ActivationFailed(StoreError),

    #[error("Failed to retire source store: {0}")]
    RetirementFailed(StoreError),
}

impl MigrationError {
    pub fn category(&self) -> FailureCategory {
        match self {
            MigrationError::DestinationUnavailable(_) | MigrationError::SourceUnavailable(_) => {
                FailureCategory::Availability
            }
            MigrationError::ReadFailed { .. } => FailureCategory::Read,
            MigrationError::WriteFailed { .. } => FailureCategory::Write,
            MigrationError::ActivationFailed(_) | MigrationError::RetirementFailed(_) => {
                FailureCategory::Transition
            }
        }
    }

    /// The store error that ended the run
    pub fn store_error(&self) -> &StoreError {
        match self {
            MigrationError::DestinationUnavailable(e)
            | MigrationError::SourceUnavailable(e)
            | MigrationError::ActivationFailed(e)
            | MigrationError::RetirementFailed(e) => e,
            MigrationError::ReadFailed { error, .. } | MigrationError::WriteFailed { error, .. } => {
                error
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Failed to read {path:?}: {error}")]
    Unreadable {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Configuration validation failed:\n{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<ConfigError>),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// Errors surfaced by a command-line run
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}
