//! Error handling module
//!
//! Unified error types for metadata access and the comparison run.

use crate::config::ConfigError;
use crate::schema::ObjectKind;
use std::fmt;
use thiserror::Error;

/// Errors an [`Accessor`](crate::accessor::Accessor) can report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Worth retrying (lost connection, lock wait timeout, ...)
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Access error: {0}")]
    Fatal(String),
}

impl AccessError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AccessError::Transient(_))
    }
}

/// Which database a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Destination => f.write_str("destination"),
        }
    }
}

/// Run-level error type
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to list {kind} objects on {side}: {source}")]
    Listing {
        kind: ObjectKind,
        side: Side,
        #[source]
        source: AccessError,
    },

    #[error("Failed to load {kind} {name} on {side}: {source}")]
    Fetch {
        kind: ObjectKind,
        side: Side,
        name: String,
        #[source]
        source: AccessError,
    },

    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: ObjectKind, name: String },

    #[error("Invalid name pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Snapshot error ({path}): {message}")]
    Snapshot { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the engine
pub type SyncResult<T> = Result<T, SyncError>;
