//! Error types for CampusChain

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The backing store could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The tail block fails its own hash recomputation; appending is refused.
    #[error("Corrupt chain at block {index}: {reason}")]
    CorruptChain { index: u64, reason: String },

    /// No chain has been persisted yet. Recovered by `Ledger::load`.
    #[error("No persisted chain found")]
    NotFound,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Persistence(format!("Serialization failed: {}", err))
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
