//! Error types for the pool ledger

use thiserror::Error;

/// Result type for pool ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pool ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Malformed request rejected before any side effect
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested debit or distribution exceeds the available balance
    #[error("Insufficient funds: requested {requested} drops, available {available} drops")]
    InsufficientFunds {
        /// Amount requested
        requested: u64,
        /// Amount available
        available: u64,
    },

    /// Escrow not found
    #[error("Escrow not found: {0}")]
    EscrowNotFound(String),

    /// Status transition outside the escrow state machine
    #[error("Invalid escrow transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: crate::types::EscrowStatus,
        /// Requested status
        to: crate::types::EscrowStatus,
    },

    /// External ledger unreachable, timed out, or rejected the request
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
