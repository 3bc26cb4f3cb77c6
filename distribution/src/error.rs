//! Error types for the distribution service

use thiserror::Error;

/// Result type for distribution operations
pub type Result<T> = std::result::Result<T, Error>;

/// Distribution service errors
#[derive(Error, Debug)]
pub enum Error {
    /// Pool ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] pool_ledger::Error),

    /// Escrow engine error
    #[error("Escrow error: {0}")]
    Escrow(#[from] escrow_engine::Error),

    /// Malformed request rejected before any side effect
    #[error("Validation error: {0}")]
    Validation(String),

    /// No payout recipients in the requested region
    #[error("No recipients found in region: {0}")]
    NoRecipients(String),

    /// Requested amount exceeds the pool balance
    #[error("Insufficient pool funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Drops requested
        requested: u64,
        /// Drops available
        available: u64,
    },

    /// External service (directory, ledger gateway) failure
    #[error("External service error: {0}")]
    ExternalService(String),

    /// The batch was cancelled before completing
    #[error("Distribution cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
