//! ReliefRail Pool Ledger
//!
//! Persistent single-writer ledger for a disaster-relief donation pool:
//! aggregate pool balance, escrow records, and the append-only transaction
//! audit log, plus the executor that settles individual payments against the
//! external transactional ledger.
//!
//! # Invariants
//!
//! - Pool non-negativity: `DonationPool.total >= 0` for all sequences of
//!   donations and distributions (unsigned amounts + checked debits)
//! - Escrow transitions are monotonic and one-directional
//! - One logical outcome (balance + audit + status) commits atomically
//! - Single writer: every mutation serializes through the pool actor

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod storage;
pub mod types;

// Re-exports
pub use actor::{spawn_pool_actor, PoolHandle};
pub use client::{ClientError, LedgerClient, LedgerEscrow, SubmitReceipt};
pub use config::Config;
pub use error::{Error, Result};
pub use executor::TransactionExecutor;
pub use storage::Storage;
pub use types::{
    Amount, DisasterTrigger, EscrowRecord, EscrowStatus, EscrowSummary, PaymentOutcome,
    Recipient, ReleaseReport, TransactionAuditRecord, TransferOutcome, WalletAddress,
};
