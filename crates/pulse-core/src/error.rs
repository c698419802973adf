//! Error types for pulse-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Entity lookup failed (unknown worker or session id)
    #[error("not found: {0}")]
    NotFound(String),

    /// Request was missing a required field or carried an invalid value
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation not legal in the entity's current state
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
