//! Error types for compass-cascade
//!
//! Defines service-specific error types using thiserror for clear error
//! propagation. Cascade operations return these so the synchronous caller
//! (the producer HTTP handler) can act on a failed step, while the bus
//! dispatcher logs them and moves on.

use thiserror::Error;

use crate::engine::EngineError;

/// Main error type for the cascade service
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors bubbled up from the shared library
    #[error(transparent)]
    Common(#[from] compass_common::Error),

    /// Compliance engine call failed
    #[error("Compliance engine error: {0}")]
    Engine(#[from] EngineError),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Operation rejected by a business precondition
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the cascade service Error
pub type Result<T> = std::result::Result<T, Error>;
