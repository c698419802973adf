//! Error types for pulse-tracker

use thiserror::Error;

/// Tracker error type
#[derive(Debug, Error)]
pub enum Error {
    /// Tracker not configured (missing worker id, key, or URL)
    #[error("tracker not configured: {0}")]
    NotConfigured(String),

    /// Ledger returned a non-2xx response
    #[error("api error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body text
        message: String,
    },

    /// Network/connection error
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Operation requires an open session
    #[error("no active session")]
    NoActiveSession,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
