//! External ledger client abstraction
//!
//! The pool core never talks to the external transactional ledger directly;
//! it goes through [`LedgerClient`]. Production wires in a JSON-RPC client,
//! tests wire in [`testing::MockLedgerClient`].

use crate::types::{Amount, WalletAddress};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by an external ledger client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network unreachable or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The ledger rejected the transaction
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// Address unknown to the ledger
    #[error("Unknown address: {0}")]
    UnknownAddress(String),
}

/// Receipt for a submitted payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Whether the ledger confirmed the transaction
    pub confirmed: bool,

    /// Transaction hash assigned by the ledger (None when unconfirmed)
    pub tx_hash: Option<String>,
}

/// An escrow object as it exists on the external ledger.
///
/// Donors can create escrows directly on the ledger, so this view is the
/// ground truth for cross-checking what the local records believe exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEscrow {
    /// Address that funded the escrow
    pub owner: WalletAddress,

    /// Address the escrow pays out to
    pub destination: WalletAddress,

    /// Escrowed amount
    pub amount: Amount,

    /// Crypto-condition attached to the escrow, if any
    pub condition: Option<String>,
}

/// Submit-and-confirm interface to the external transactional ledger.
///
/// Calls may block for the full external confirmation round-trip; timeout
/// enforcement lives in [`crate::executor::TransactionExecutor`], not here.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit one payment and wait for the ledger's confirmation
    async fn submit_payment(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        amount: Amount,
    ) -> std::result::Result<SubmitReceipt, ClientError>;

    /// Balance of an address on the external ledger
    async fn get_balance(
        &self,
        address: &WalletAddress,
    ) -> std::result::Result<Amount, ClientError>;

    /// On-ledger escrow objects paying out to `destination`
    async fn find_escrows(
        &self,
        destination: &WalletAddress,
    ) -> std::result::Result<Vec<LedgerEscrow>, ClientError>;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! Scriptable mock ledger client for tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// A recorded submit attempt
    #[derive(Debug, Clone)]
    pub struct RecordedSubmit {
        /// Sender address
        pub from: WalletAddress,
        /// Destination address
        pub to: WalletAddress,
        /// Amount attempted
        pub amount: Amount,
    }

    /// Mock [`LedgerClient`] with per-address scripted outcomes.
    ///
    /// - payments touching an address in `fail_for` are rejected
    /// - payments touching an address in `hang_for` never confirm (timeout
    ///   testing)
    /// - everything else confirms with a synthetic hash
    #[derive(Default)]
    pub struct MockLedgerClient {
        balances: Mutex<HashMap<String, Amount>>,
        fail_for: Mutex<HashSet<String>>,
        hang_for: Mutex<HashSet<String>>,
        latency: Mutex<Duration>,
        submits: Mutex<Vec<RecordedSubmit>>,
        ledger_escrows: Mutex<Vec<LedgerEscrow>>,
        sequence: AtomicU64,
    }

    impl MockLedgerClient {
        /// New mock with no scripted failures
        pub fn new() -> Self {
            Self::default()
        }

        /// Set the balance reported for `address`
        pub fn set_balance(&self, address: &WalletAddress, amount: Amount) {
            self.balances
                .lock()
                .insert(address.as_str().to_string(), amount);
        }

        /// Reject every payment sent to or from `address`
        pub fn fail_payments_touching(&self, address: &WalletAddress) {
            self.fail_for.lock().insert(address.as_str().to_string());
        }

        /// Never confirm payments touching `address` (simulates a stuck
        /// submit)
        pub fn hang_payments_touching(&self, address: &WalletAddress) {
            self.hang_for.lock().insert(address.as_str().to_string());
        }

        /// Add simulated confirmation latency to every call
        pub fn set_latency(&self, latency: Duration) {
            *self.latency.lock() = latency;
        }

        /// All submit attempts seen so far
        pub fn submits(&self) -> Vec<RecordedSubmit> {
            self.submits.lock().clone()
        }

        /// Plant an escrow object on the simulated ledger
        pub fn add_ledger_escrow(&self, escrow: LedgerEscrow) {
            self.ledger_escrows.lock().push(escrow);
        }
    }

    #[async_trait]
    impl LedgerClient for MockLedgerClient {
        async fn submit_payment(
            &self,
            from: &WalletAddress,
            to: &WalletAddress,
            amount: Amount,
        ) -> std::result::Result<SubmitReceipt, ClientError> {
            self.submits.lock().push(RecordedSubmit {
                from: from.clone(),
                to: to.clone(),
                amount,
            });

            let latency = *self.latency.lock();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let hangs = {
                let hang_for = self.hang_for.lock();
                hang_for.contains(to.as_str()) || hang_for.contains(from.as_str())
            };
            if hangs {
                // Outlives any sane call timeout
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }

            let fails = {
                let fail_for = self.fail_for.lock();
                fail_for.contains(to.as_str()) || fail_for.contains(from.as_str())
            };
            if fails {
                return Err(ClientError::Rejected(format!(
                    "scripted failure for {from} -> {to}"
                )));
            }

            let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
            Ok(SubmitReceipt {
                confirmed: true,
                tx_hash: Some(format!("MOCKTX{seq:08}")),
            })
        }

        async fn get_balance(
            &self,
            address: &WalletAddress,
        ) -> std::result::Result<Amount, ClientError> {
            self.balances
                .lock()
                .get(address.as_str())
                .copied()
                .ok_or_else(|| ClientError::UnknownAddress(address.to_string()))
        }

        async fn find_escrows(
            &self,
            destination: &WalletAddress,
        ) -> std::result::Result<Vec<LedgerEscrow>, ClientError> {
            Ok(self
                .ledger_escrows
                .lock()
                .iter()
                .filter(|e| e.destination == *destination)
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockLedgerClient;
    use super::*;

    #[tokio::test]
    async fn test_mock_confirms_by_default() {
        let client = MockLedgerClient::new();
        let receipt = client
            .submit_payment(
                &WalletAddress::new("rFrom"),
                &WalletAddress::new("rTo"),
                Amount::from_drops(10),
            )
            .await
            .unwrap();

        assert!(receipt.confirmed);
        assert!(receipt.tx_hash.unwrap().starts_with("MOCKTX"));
        assert_eq!(client.submits().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_scripted_failure_and_balance() {
        let client = MockLedgerClient::new();
        let to = WalletAddress::new("rBad");
        client.fail_payments_touching(&to);

        let err = client
            .submit_payment(&WalletAddress::new("rFrom"), &to, Amount::from_drops(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)));

        let central = WalletAddress::new("rCentral");
        assert!(matches!(
            client.get_balance(&central).await.unwrap_err(),
            ClientError::UnknownAddress(_)
        ));
        client.set_balance(&central, Amount::from_drops(500));
        assert_eq!(client.get_balance(&central).await.unwrap(), Amount::from_drops(500));
    }

    #[tokio::test]
    async fn test_mock_lists_escrows_by_destination() {
        let client = MockLedgerClient::new();
        let central = WalletAddress::new("rCentral");
        let elsewhere = WalletAddress::new("rElsewhere");

        client.add_ledger_escrow(LedgerEscrow {
            owner: WalletAddress::new("rDonorA"),
            destination: central.clone(),
            amount: Amount::from_drops(40),
            condition: Some("A0".repeat(32)),
        });
        client.add_ledger_escrow(LedgerEscrow {
            owner: WalletAddress::new("rDonorB"),
            destination: elsewhere.clone(),
            amount: Amount::from_drops(7),
            condition: None,
        });

        let found = client.find_escrows(&central).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner, WalletAddress::new("rDonorA"));
        assert_eq!(found[0].amount, Amount::from_drops(40));

        assert!(client
            .find_escrows(&WalletAddress::new("rEmpty"))
            .await
            .unwrap()
            .is_empty());
    }
}
