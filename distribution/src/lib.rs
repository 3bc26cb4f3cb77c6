//! ReliefRail Distribution Service
//!
//! Payout distribution for the disaster-relief donation pool: even splitting
//! of pool funds across region recipients, bounded concurrent transfer
//! fan-out with per-transfer bookkeeping, cancellable background batches,
//! and the admin facade that chains escrow release into payout.
//!
//! # Financial invariants
//!
//! - The pool is debited only for transfers the external ledger confirmed
//! - Floor-division remainders stay in the pool, never redistributed
//! - A refused debit after a confirmed payout is an anomaly, not a panic

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod directory;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod service;

// Re-exports
pub use config::Config;
pub use directory::{StaticDirectory, UserDirectory};
pub use error::{Error, Result};
pub use job::{cancel_pair, BackgroundJob, CancelHandle, CancelToken};
pub use orchestrator::{DistributionOrchestrator, DistributionSummary};
pub use service::{AdminService, DistributeAck, ReliefCycleReport};
