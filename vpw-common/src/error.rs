//! Common error types for VPW

use thiserror::Error;

/// Common result type for VPW operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across VPW crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected user input (e.g. plate text that normalizes to nothing)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with one already in progress
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
