//! Common error types for starlog

use thiserror::Error;

/// Common result type for starlog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across starlog services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found (or not visible to the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not allowed to touch the resource
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Remote capability or other infrastructure failure
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
