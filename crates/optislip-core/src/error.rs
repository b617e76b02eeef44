//! Error types for optislip-core

use thiserror::Error;

/// Result type alias using optislip-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in optislip-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input, rejected before anything is persisted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller could not be mapped to a root owner
    #[error("Ownership error: {0}")]
    Ownership(String),

    /// Another dispatch pass already holds the owner's lease
    #[error("Dispatch already running for owner {0}")]
    DispatchInProgress(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error comes from the storage layer rather than from the caller.
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::LibSql(_) | Self::Io(_) | Self::Serialization(_)
        )
    }
}
