//! Concurrent payout distribution
//!
//! Splits a pool amount evenly across recipients and fans the transfers out
//! against the external ledger with bounded concurrency, a batch deadline,
//! and cooperative cancellation. Bookkeeping is per-transfer: the pool is
//! debited only for shares whose payment the ledger confirmed, so a partial
//! batch leaves the pool exactly as large as the unpaid shares plus the
//! division remainder.

use crate::directory::UserDirectory;
use crate::job::CancelToken;
use crate::{Config, Error, Result};
use pool_ledger::types::{Amount, Recipient, WalletAddress};
use pool_ledger::{PoolHandle, TransactionExecutor};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

/// Result of one distribution batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSummary {
    /// Recipients the batch attempted to pay
    pub attempted: usize,

    /// Transfers confirmed by the external ledger
    pub succeeded: usize,

    /// Transfers rejected, errored, or timed out
    pub failed: usize,

    /// Per-recipient share (floor division)
    pub share: Amount,

    /// Exact total debited from the pool (share per confirmed transfer)
    pub distributed_total: Amount,

    /// Remainder kept by the pool after floor division
    pub remainder: Amount,

    /// Confirmed transfers whose pool debit was refused (pool would have
    /// gone negative). Each one is a bookkeeping discrepancy to investigate.
    pub anomalies: usize,

    /// Whether the batch was cut short by cancellation or deadline
    pub cut_short: bool,
}

/// Per-transfer result collected from the fan-out tasks
struct TransferResult {
    success: bool,
    debited: bool,
}

/// Runs distribution batches against the pool and the external ledger
pub struct DistributionOrchestrator {
    pool: PoolHandle,
    executor: TransactionExecutor,
    directory: Arc<dyn UserDirectory>,
    config: Config,
    run_lock: Mutex<()>,
}

impl DistributionOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        pool: PoolHandle,
        executor: TransactionExecutor,
        directory: Arc<dyn UserDirectory>,
        config: Config,
    ) -> Self {
        Self {
            pool,
            executor,
            directory,
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Distribute `amount` evenly across `recipients`.
    ///
    /// Validation happens before any side effect: the amount must be
    /// positive, the recipient list non-empty, the per-recipient share
    /// non-zero, and the pool large enough for the full amount. After that,
    /// transfers proceed independently; one failed payout never blocks the
    /// others, and only confirmed payouts debit the pool.
    ///
    /// Whole runs are serialized: the balance precondition and this batch's
    /// debits must not interleave with another batch over the same pool, so
    /// two concurrent calls can never both pass the precondition against the
    /// same funds.
    pub async fn distribute(
        &self,
        amount: Amount,
        recipients: Vec<Recipient>,
        mut cancel: CancelToken,
    ) -> Result<DistributionSummary> {
        if amount.is_zero() {
            return Err(Error::Validation(
                "Distribution amount must be positive".to_string(),
            ));
        }
        if recipients.is_empty() {
            return Err(Error::Validation(
                "Distribution requires at least one recipient".to_string(),
            ));
        }

        let (share, remainder) = amount
            .split_evenly(recipients.len() as u64)
            .ok_or_else(|| Error::Validation("Recipient count overflow".to_string()))?;
        if share.is_zero() {
            return Err(Error::Validation(format!(
                "Amount {} too small to split across {} recipients",
                amount,
                recipients.len()
            )));
        }

        // Held for the whole run: precondition and debits are one critical
        // section with respect to other batches.
        let _run = self.run_lock.lock().await;

        let available = self.pool.pool_total().await?;
        if available < amount {
            return Err(Error::InsufficientFunds {
                requested: amount.drops(),
                available: available.drops(),
            });
        }

        let attempted = recipients.len();
        tracing::info!(
            attempted,
            %amount,
            %share,
            %remainder,
            "Starting distribution batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers.max(1)));
        let source = WalletAddress::new(self.config.central_wallet.clone());
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.batch_deadline_ms);

        // Closed on cancel/deadline: transfers not yet submitted are skipped,
        // but in-flight submissions always run to settlement. Aborting a task
        // between external confirmation and the audit/debit would strand a
        // confirmed payment.
        let gate = Arc::new(AtomicBool::new(false));

        let mut join_set = JoinSet::new();
        for recipient in recipients {
            let semaphore = semaphore.clone();
            let gate = gate.clone();
            let executor = self.executor.clone();
            let pool = self.pool.clone();
            let directory = self.directory.clone();
            let from = source.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if gate.load(Ordering::Acquire) {
                    return TransferResult {
                        success: false,
                        debited: false,
                    };
                }
                transfer_one(&executor, &pool, directory.as_ref(), &from, &recipient, share).await
            });
        }

        let mut results: Vec<TransferResult> = Vec::with_capacity(attempted);
        let mut cut_short = false;
        loop {
            tokio::select! {
                joined = join_set.join_next() => match joined {
                    Some(Ok(result)) => results.push(result),
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Transfer task failed");
                        results.push(TransferResult { success: false, debited: false });
                    }
                    None => break,
                },
                _ = cancel.cancelled(), if !cut_short => {
                    tracing::warn!(
                        completed = results.len(),
                        attempted,
                        "Distribution cancelled, closing admission; in-flight transfers settle"
                    );
                    cut_short = true;
                    gate.store(true, Ordering::Release);
                }
                _ = tokio::time::sleep_until(deadline), if !cut_short => {
                    tracing::warn!(
                        completed = results.len(),
                        attempted,
                        deadline_ms = self.config.batch_deadline_ms,
                        "Distribution batch deadline reached, closing admission"
                    );
                    cut_short = true;
                    gate.store(true, Ordering::Release);
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let debited = results.iter().filter(|r| r.debited).count();
        let anomalies = succeeded - debited;
        // share * debited <= amount by construction
        let distributed_total = share
            .checked_mul(debited as u64)
            .ok_or_else(|| Error::Validation("Distributed total overflow".to_string()))?;

        let summary = DistributionSummary {
            attempted,
            succeeded,
            failed: results.len() - succeeded,
            share,
            distributed_total,
            remainder,
            anomalies,
            cut_short,
        };

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            distributed_total = %summary.distributed_total,
            anomalies = summary.anomalies,
            cut_short = summary.cut_short,
            "Distribution batch complete"
        );

        Ok(summary)
    }

    /// Resolve the recipients for `region` through the directory
    pub async fn recipients_for_region(&self, region: &str) -> Result<Vec<Recipient>> {
        let recipients = self.directory.find_by_region(region).await?;
        if recipients.is_empty() {
            return Err(Error::NoRecipients(region.to_string()));
        }
        Ok(recipients)
    }
}

/// Pay one recipient and settle the bookkeeping for the outcome.
///
/// The payment attempt is audited by the executor. On confirmation the pool
/// is debited by the share; a refused debit means the authoritative balance
/// no longer covers a payment the ledger already made, which is surfaced as
/// an anomaly rather than a panic. The mirrored directory balance is then
/// credited best-effort.
async fn transfer_one(
    executor: &TransactionExecutor,
    pool: &PoolHandle,
    directory: &dyn UserDirectory,
    from: &WalletAddress,
    recipient: &Recipient,
    share: Amount,
) -> TransferResult {
    let outcome = match executor
        .submit_payment(from, &recipient.wallet_address, share)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                user_id = recipient.user_id,
                error = %e,
                "Audit persistence failed for transfer"
            );
            return TransferResult {
                success: false,
                debited: false,
            };
        }
    };

    if !outcome.success {
        return TransferResult {
            success: false,
            debited: false,
        };
    }

    let debited = match pool.debit_pool(share).await {
        Ok(_) => true,
        Err(pool_ledger::Error::InsufficientFunds {
            requested,
            available,
        }) => {
            tracing::warn!(
                user_id = recipient.user_id,
                requested,
                available,
                "Confirmed payout exceeds pool balance, recording anomaly"
            );
            false
        }
        Err(e) => {
            tracing::error!(user_id = recipient.user_id, error = %e, "Pool debit failed");
            false
        }
    };

    if let Err(e) = directory
        .credit_mirrored_balance(recipient.user_id, share)
        .await
    {
        // Mirror is advisory; the audit log is the source of truth
        tracing::warn!(user_id = recipient.user_id, error = %e, "Mirror credit failed");
    }

    TransferResult {
        success: true,
        debited,
    }
}
