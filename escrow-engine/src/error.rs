//! Error types for the escrow engine

use thiserror::Error;

/// Result type for escrow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Escrow engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Pool ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] pool_ledger::Error),

    /// Condition encoding deviated from 64 hex characters
    #[error("Invalid condition length: {0} (expected 64 hex characters)")]
    InvalidConditionLength(usize),

    /// Fulfillment encryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Fulfillment decryption failed
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Malformed request rejected before any side effect
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
