//! Core error types for routinely-core.
//!
//! Every failure in this crate is recoverable: an operation that returns an
//! error has either changed nothing, or (for persistence failures) has applied
//! its in-memory mutation and left the durable copy to be healed by the next
//! successful save.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{RoutineId, TaskId};

/// Core error type for routinely-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The routine does not exist in the store.
    #[error("Routine not found: {0}")]
    RoutineNotFound(RoutineId),

    /// The task does not exist on any routine in the store.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// An operation needed an active routine and none is active.
    #[error("No routine is currently active")]
    NoActiveRoutine,

    /// The routine is pending or retired, so it cannot take completions.
    #[error("Routine {0} is not running today")]
    NotRunning(RoutineId),

    /// Today's record was already finalized; completions are frozen.
    #[error("Day {date} is already finalized for routine {routine_id}")]
    DayFinalized {
        routine_id: RoutineId,
        date: chrono::NaiveDate,
    },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded into a model value.
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The backend refused the write (used by non-SQLite backends).
    #[error("Write rejected: {0}")]
    WriteRejected(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be determined or created.
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A required string was empty after trimming.
    #[error("'{field}' must not be empty")]
    Empty { field: &'static str },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
