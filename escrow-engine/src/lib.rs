//! ReliefRail Escrow Engine
//!
//! Cryptographically conditioned escrows for disaster-relief donations:
//! hash-lock condition generation, encrypted fulfillment storage, and the
//! escrow lifecycle state machine with bulk claim, concurrent release, and
//! outcome reconciliation.
//!
//! # Lifecycle
//!
//! ```text
//! Registered --claim--> Processing --success--> Completed
//! Processing --failure/exception--> Failed
//! Processing --no outcome before batch ends--> Failed   (sweep rule)
//! Registered --explicit cancel--> Cancelled
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod conditions;
pub mod config;
pub mod error;
pub mod manager;
pub mod vault;

// Re-exports
pub use conditions::{create_condition, verify, ConditionPair, CONDITION_HEX_LEN};
pub use config::Config;
pub use error::{Error, Result};
pub use manager::EscrowLifecycleManager;
pub use vault::{FulfillmentVault, SecretStore};
