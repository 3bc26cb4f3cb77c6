//! Core types for the donation pool ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (integer drops for money, no floating point)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Monetary amount in the smallest ledger unit ("drops").
///
/// A single fixed-point integer representation is used throughout the core.
/// The type is unsigned, so a negative balance is unrepresentable; debits go
/// through [`Amount::checked_sub`] and fail instead of wrapping.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    /// Zero drops
    pub const ZERO: Amount = Amount(0);

    /// Create from raw drops
    pub const fn from_drops(drops: u64) -> Self {
        Self(drops)
    }

    /// Raw drops value
    pub const fn drops(&self) -> u64 {
        self.0
    }

    /// True if zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction (None if the result would be negative)
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Saturating addition
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Split evenly across `parts` recipients.
    ///
    /// Returns `(per_part, remainder)` using floor division. The remainder is
    /// the caller's to keep; this crate never redistributes it.
    pub fn split_evenly(self, parts: u64) -> Option<(Amount, Amount)> {
        if parts == 0 {
            return None;
        }
        Some((Amount(self.0 / parts), Amount(self.0 % parts)))
    }

    /// Multiply by a count (e.g. `share * succeeded`)
    pub fn checked_mul(self, count: u64) -> Option<Amount> {
        self.0.checked_mul(count).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc.saturating_add(a))
    }
}

/// External ledger wallet address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Create new wallet address
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Escrow lifecycle status
///
/// Transitions are monotonic and one-directional:
///
/// ```text
/// Registered --claim--> Processing --success--> Completed
/// Processing --failure/timeout--> Failed
/// Registered --cancel--> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EscrowStatus {
    /// Created and waiting for a release trigger
    Registered = 1,
    /// Claimed by a release batch, release in flight
    Processing = 2,
    /// Release confirmed by the external ledger
    Completed = 3,
    /// Release failed or the outcome never arrived (sweep rule)
    Failed = 4,
    /// Cancelled by the owner before any release batch claimed it
    Cancelled = 5,
}

impl EscrowStatus {
    /// Index key byte for status-prefixed scans
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Terminal states admit no further transitions
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            EscrowStatus::Completed | EscrowStatus::Failed | EscrowStatus::Cancelled
        )
    }

    /// Whether the state machine allows `self -> to`
    pub fn can_transition(self, to: EscrowStatus) -> bool {
        use EscrowStatus::*;
        matches!(
            (self, to),
            (Registered, Processing) | (Registered, Cancelled) | (Processing, Completed) | (Processing, Failed)
        )
    }

    /// Human-readable name (stable, used in summaries)
    pub const fn as_str(self) -> &'static str {
        match self {
            EscrowStatus::Registered => "Registered",
            EscrowStatus::Processing => "Processing",
            EscrowStatus::Completed => "Completed",
            EscrowStatus::Failed => "Failed",
            EscrowStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Disaster trigger correlating which escrows a release batch targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasterTrigger {
    /// Type of disaster (flood, drought, cyclone, ...)
    pub disaster_type: String,

    /// Affected geographic region
    pub region: String,

    /// Trigger threshold value
    pub threshold: i64,
}

/// A conditional hold of donated funds
///
/// Created once on donation, mutated only by lifecycle reconciliation,
/// never deleted (audit requirement).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Unique escrow ID (also keys the encrypted fulfillment)
    pub escrow_id: Uuid,

    /// Donor wallet that funded this escrow
    pub owner_wallet: WalletAddress,

    /// Escrowed amount in drops
    pub amount: Amount,

    /// Public hash-lock commitment (64 hex chars)
    pub condition: String,

    /// Fulfillment preimage, AES-256-GCM encrypted at rest
    #[serde(with = "serde_bytes")]
    pub encrypted_fulfillment: Vec<u8>,

    /// Trigger metadata this escrow was registered against
    pub disaster: DisasterTrigger,

    /// After this instant the owner may reclaim the funds
    pub cancel_after: DateTime<Utc>,

    /// Current lifecycle status
    pub status: EscrowStatus,

    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

/// Outcome recorded for one external payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransferOutcome {
    /// Confirmed by the external ledger
    Success = 1,
    /// Rejected, errored, or timed out
    Failed = 2,
}

/// Append-only log entry per external payment attempt.
///
/// Never updated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAuditRecord {
    /// Record ID (UUIDv7 for time-ordering)
    pub record_id: Uuid,

    /// Sending wallet
    pub from_address: WalletAddress,

    /// Receiving wallet
    pub to_address: WalletAddress,

    /// Amount attempted, in drops
    pub amount: Amount,

    /// External transaction hash (None when the attempt failed)
    pub tx_hash: Option<String>,

    /// Attempt outcome
    pub outcome: TransferOutcome,

    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,
}

impl TransactionAuditRecord {
    /// Build a success record
    pub fn success(
        from: WalletAddress,
        to: WalletAddress,
        amount: Amount,
        tx_hash: impl Into<String>,
    ) -> Self {
        Self {
            record_id: Uuid::now_v7(),
            from_address: from,
            to_address: to,
            amount,
            tx_hash: Some(tx_hash.into()),
            outcome: TransferOutcome::Success,
            timestamp: Utc::now(),
        }
    }

    /// Build a failure record (no transaction hash)
    pub fn failure(from: WalletAddress, to: WalletAddress, amount: Amount) -> Self {
        Self {
            record_id: Uuid::now_v7(),
            from_address: from,
            to_address: to,
            amount,
            tx_hash: None,
            outcome: TransferOutcome::Failed,
            timestamp: Utc::now(),
        }
    }
}

/// Read-only projection of a payout recipient, supplied by the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Surrogate user ID in the directory
    pub user_id: u64,

    /// Payout destination wallet
    pub wallet_address: WalletAddress,

    /// Region the recipient lives in
    pub region: String,
}

/// Result of one executed payment (executor output)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// Whether the external ledger confirmed the payment
    pub success: bool,

    /// Transaction hash when confirmed
    pub tx_hash: Option<String>,
}

/// Result of reconciling one release batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReport {
    /// Escrows transitioned in this pass (succeeded + failed)
    pub total: usize,

    /// Escrows reconciled to Completed
    pub succeeded: usize,

    /// Escrows reconciled to Failed, including swept orphans
    pub failed: usize,

    /// Exact sum of amounts over escrows reaching Completed in this pass
    pub released_sum: Amount,
}

/// Aggregate escrow statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowSummary {
    /// Total escrow records
    pub total_escrows: usize,

    /// Sum of all escrowed amounts
    pub total_amount: Amount,

    /// Record count per status
    pub by_status: BTreeMap<String, usize>,

    /// Record count per disaster type
    pub by_disaster_type: BTreeMap<String, usize>,
}
