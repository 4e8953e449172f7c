//! Error handling module for Pomotrack.
//!
//! This module provides a unified error type using the `thiserror` crate,
//! consolidating all error types from store, lifecycle and analytics
//! operations into a single enum.

use std::io;
use thiserror::Error;

/// Unified error type for Pomotrack.
///
/// `NotFound` is the only non-fatal variant: the operation it came from
/// becomes a no-op and the caller reports it as a notice.
#[derive(Error, Debug)]
pub enum PomoError {
    /// No active, paused or previous session where one was expected
    #[error("{0}")]
    NotFound(String),

    /// Stored state contradicts the requested transition
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// The session store could not be opened, pooled or migrated
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    /// Another writer held the store for longer than the retry budget
    #[error("Session store is busy: {0}")]
    Busy(String),

    /// Malformed input rejected before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic operation errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Pomotrack operations
pub type Result<T> = std::result::Result<T, PomoError>;

impl PomoError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        PomoError::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        PomoError::InvalidState(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        PomoError::StoreUnavailable(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        PomoError::Busy(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        PomoError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PomoError::Config(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        PomoError::Other(msg.into())
    }

    /// Whether the invoking command should abort with a failure exit code.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PomoError::NotFound(_))
    }

    /// True for SQLite busy/locked failures, before or after retries.
    pub fn is_busy(&self) -> bool {
        match self {
            PomoError::Busy(_) => true,
            PomoError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl From<String> for PomoError {
    fn from(s: String) -> Self {
        PomoError::Other(s)
    }
}

impl From<&str> for PomoError {
    fn from(s: &str) -> Self {
        PomoError::Other(s.to_string())
    }
}

impl From<r2d2::Error> for PomoError {
    fn from(e: r2d2::Error) -> Self {
        PomoError::Busy(format!("Failed to get connection from pool: {}", e))
    }
}
