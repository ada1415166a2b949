//! Core error types for focusguard-core.
//!
//! Nothing in this crate is fatal to the host process: the monitor and the
//! timer keep running across any single operation's failure. These types
//! exist so callers can tell permission problems, transient process errors,
//! validation rejections and storage failures apart.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focusguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Permission errors (elevated privileges required)
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    /// Process inspection/termination errors
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to save settings
    #[error("Failed to save settings to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid settings value
    #[error("Invalid settings value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown settings key
    #[error("Unknown settings key: {0}")]
    UnknownKey(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the session database
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

    /// Session not found by id
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

/// Validation errors, returned before invalid state is applied.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A duration setting is out of range
    #[error("Invalid duration for '{field}': {message}")]
    InvalidDuration { field: String, message: String },

    /// Duplicate rule id within a rule list
    #[error("Duplicate rule id '{id}' in {list}")]
    DuplicateRuleId { id: String, list: String },

    /// A rule field is empty or malformed
    #[error("Invalid rule '{id}': {message}")]
    InvalidRule { id: String, message: String },
}

/// Permission errors for privileged operations (hosts file, firewall).
///
/// Never silently retried; the caller decides whether to re-attempt with
/// elevation.
#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("Operation '{operation}' requires elevated privileges")]
    ElevationRequired { operation: String },
}

/// Transient process-level errors. Swallowed at the scan-pass level and
/// logged; they never affect the monitor's schedule.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Process '{name}' not found")]
    NotFound { name: String },

    #[error("Access denied terminating pid {pid}")]
    AccessDenied { pid: u32 },

    #[error("Process enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("Termination of pid {pid} did not complete within {wait_secs}s")]
    TerminationTimeout { pid: u32, wait_secs: u64 },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(StorageError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
