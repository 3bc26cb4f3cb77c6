//! Payment execution against the external ledger
//!
//! [`TransactionExecutor`] performs one submit-and-confirm call and converts
//! its outcome into a durable audit record plus a boolean result. External
//! failures of any kind (network error, rejection, timeout) are captured here
//! and surface as `success == false`; they never propagate as errors. The only
//! error this module returns is a persistence failure writing the audit
//! record.
//!
//! The executor never mutates shared balances. Callers apply pool debits and
//! escrow transitions only after observing `success == true`, and callers
//! wanting retry must resubmit explicitly (idempotency is their problem).

use crate::actor::PoolHandle;
use crate::client::{ClientError, LedgerClient};
use crate::types::{Amount, PaymentOutcome, TransactionAuditRecord, WalletAddress};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Executes single external payments and records their outcomes
#[derive(Clone)]
pub struct TransactionExecutor {
    client: Arc<dyn LedgerClient>,
    pool: PoolHandle,
    call_timeout: Duration,
}

impl TransactionExecutor {
    /// Create a new executor with a bounded per-call timeout
    pub fn new(client: Arc<dyn LedgerClient>, pool: PoolHandle, call_timeout: Duration) -> Self {
        Self {
            client,
            pool,
            call_timeout,
        }
    }

    /// The configured per-call timeout
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Submit one payment, audit the outcome, and return it.
    ///
    /// Exactly one audit record is written per call, before this returns:
    /// `(tx_hash, Success)` on confirmation, `(None, Failed)` otherwise.
    pub async fn submit_payment(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        amount: Amount,
    ) -> Result<PaymentOutcome> {
        let submitted = timeout(
            self.call_timeout,
            self.client.submit_payment(from, to, amount),
        )
        .await;

        let outcome = match submitted {
            Ok(Ok(receipt)) if receipt.confirmed => PaymentOutcome {
                success: true,
                tx_hash: receipt.tx_hash,
            },
            Ok(Ok(receipt)) => {
                tracing::warn!(%from, %to, %amount, ?receipt, "Payment not confirmed");
                PaymentOutcome {
                    success: false,
                    tx_hash: None,
                }
            }
            Ok(Err(err)) => {
                self.log_client_error(from, to, amount, &err);
                PaymentOutcome {
                    success: false,
                    tx_hash: None,
                }
            }
            Err(_) => {
                tracing::warn!(
                    %from, %to, %amount,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "Payment timed out waiting for confirmation"
                );
                PaymentOutcome {
                    success: false,
                    tx_hash: None,
                }
            }
        };

        let audit = match &outcome.tx_hash {
            Some(hash) => {
                TransactionAuditRecord::success(from.clone(), to.clone(), amount, hash.clone())
            }
            None => TransactionAuditRecord::failure(from.clone(), to.clone(), amount),
        };
        self.pool.append_audit(audit).await?;

        if outcome.success {
            tracing::debug!(%from, %to, %amount, "Payment confirmed");
        }

        Ok(outcome)
    }

    fn log_client_error(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        amount: Amount,
        err: &ClientError,
    ) {
        match err {
            ClientError::Network(msg) => {
                tracing::warn!(%from, %to, %amount, error = %msg, "Ledger unreachable")
            }
            ClientError::Rejected(msg) => {
                tracing::warn!(%from, %to, %amount, error = %msg, "Payment rejected")
            }
            ClientError::UnknownAddress(addr) => {
                tracing::warn!(%from, %to, %amount, address = %addr, "Unknown address")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_pool_actor;
    use crate::client::testing::MockLedgerClient;
    use crate::types::TransferOutcome;
    use crate::{Config, Storage};

    fn setup() -> (Arc<MockLedgerClient>, PoolHandle, tempfile::TempDir) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let storage = Arc::new(Storage::open(&config).unwrap());
        let pool = spawn_pool_actor(storage, 64);
        (Arc::new(MockLedgerClient::new()), pool, temp_dir)
    }

    #[tokio::test]
    async fn test_success_writes_success_audit() {
        let (client, pool, _temp) = setup();
        let executor =
            TransactionExecutor::new(client, pool.clone(), Duration::from_secs(5));

        let outcome = executor
            .submit_payment(
                &WalletAddress::new("rCentral"),
                &WalletAddress::new("rUser"),
                Amount::from_drops(33),
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.tx_hash.is_some());

        let audit = pool.audit_records().await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].outcome, TransferOutcome::Success);
        assert_eq!(audit[0].tx_hash, outcome.tx_hash);
    }

    #[tokio::test]
    async fn test_rejection_becomes_false_not_error() {
        let (client, pool, _temp) = setup();
        let to = WalletAddress::new("rUser");
        client.fail_payments_touching(&to);

        let executor =
            TransactionExecutor::new(client, pool.clone(), Duration::from_secs(5));

        let outcome = executor
            .submit_payment(&WalletAddress::new("rCentral"), &to, Amount::from_drops(33))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.tx_hash.is_none());

        let audit = pool.audit_records().await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].outcome, TransferOutcome::Failed);
        assert!(audit[0].tx_hash.is_none());
    }

    #[tokio::test]
    async fn test_timeout_becomes_false() {
        let (client, pool, _temp) = setup();
        let to = WalletAddress::new("rStuck");
        client.hang_payments_touching(&to);

        let executor =
            TransactionExecutor::new(client, pool.clone(), Duration::from_millis(50));

        let outcome = executor
            .submit_payment(&WalletAddress::new("rCentral"), &to, Amount::from_drops(33))
            .await
            .unwrap();

        assert!(!outcome.success);

        // Still exactly one audit record
        assert_eq!(pool.audit_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_audit_record_per_call() {
        let (client, pool, _temp) = setup();
        let executor =
            TransactionExecutor::new(client, pool.clone(), Duration::from_secs(5));

        let from = WalletAddress::new("rCentral");
        for i in 0..3 {
            let to = WalletAddress::new(format!("rUser{i}"));
            executor
                .submit_payment(&from, &to, Amount::from_drops(10))
                .await
                .unwrap();
        }

        assert_eq!(pool.audit_records().await.unwrap().len(), 3);
    }
}
