//! Escrow lifecycle management
//!
//! Owns every escrow state transition: registration, cancellation, batch
//! claiming, concurrent release against the external ledger, and
//! reconciliation of outcomes back into authoritative statuses.

use crate::{conditions, vault::SecretStore, Config, Error, Result};
use pool_ledger::{
    types::{Amount, DisasterTrigger, EscrowRecord, EscrowStatus, EscrowSummary, ReleaseReport},
    PoolHandle, TransactionExecutor, WalletAddress,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Manages the escrow state machine and release orchestration
pub struct EscrowLifecycleManager {
    pool: PoolHandle,
    executor: TransactionExecutor,
    vault: Arc<dyn SecretStore>,
    config: Config,
}

impl EscrowLifecycleManager {
    /// Create a new lifecycle manager
    pub fn new(
        pool: PoolHandle,
        executor: TransactionExecutor,
        vault: Arc<dyn SecretStore>,
        config: Config,
    ) -> Self {
        Self {
            pool,
            executor,
            vault,
            config,
        }
    }

    /// Register a new conditional escrow for a donation.
    ///
    /// Generates the hash-lock pair, encrypts the fulfillment, and persists
    /// a Registered record. The pool itself is credited at donation time by
    /// the donation path, not here.
    pub async fn register_escrow(
        &self,
        owner: WalletAddress,
        amount: Amount,
        trigger: DisasterTrigger,
    ) -> Result<EscrowRecord> {
        if amount.is_zero() {
            return Err(Error::Validation(
                "Escrow amount must be positive".to_string(),
            ));
        }

        let pair = conditions::create_condition(&trigger)?;
        let encrypted_fulfillment = self.vault.encrypt(pair.fulfillment.as_bytes())?;

        let now = Utc::now();
        let record = EscrowRecord {
            escrow_id: Uuid::new_v4(),
            owner_wallet: owner,
            amount,
            condition: pair.condition,
            encrypted_fulfillment,
            disaster: trigger,
            cancel_after: now + ChronoDuration::days(self.config.cancel_after_days),
            status: EscrowStatus::Registered,
            created_at: now,
        };

        self.pool.register_escrow(record.clone()).await?;

        tracing::info!(
            escrow_id = %record.escrow_id,
            amount = %record.amount,
            disaster_type = %record.disaster.disaster_type,
            region = %record.disaster.region,
            "Escrow registered"
        );

        Ok(record)
    }

    /// Cancel an escrow; only valid while it is still Registered.
    pub async fn cancel_escrow(&self, escrow_id: Uuid) -> Result<EscrowRecord> {
        Ok(self.pool.cancel_escrow(escrow_id).await?)
    }

    /// Atomically claim all Registered escrows for release.
    ///
    /// Every claimed escrow is Processing before any release attempt starts,
    /// so a second concurrent batch cannot double-release any of them.
    pub async fn claim_registered_batch(&self) -> Result<Vec<EscrowRecord>> {
        Ok(self.pool.claim_registered().await?)
    }

    /// Release a claimed batch concurrently through the payment executor.
    ///
    /// Each escrow's fulfillment is decrypted, verified against its
    /// condition, and submitted. Per-escrow failures are isolated. Once the
    /// batch deadline passes, escrows not yet submitted fail immediately,
    /// while in-flight submissions still run to settlement (their audit
    /// record and outcome always land). Escrows whose outcome never arrives
    /// are swept to Failed at reconciliation.
    pub async fn release_batch(&self, claimed: Vec<EscrowRecord>) -> Vec<(Uuid, bool)> {
        if claimed.is_empty() {
            return vec![];
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_releases.max(1)));
        let destination = WalletAddress::new(self.config.central_wallet.clone());
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.batch_deadline_ms);

        // Closed at the deadline; a release already submitted must not be
        // aborted between confirmation and its audit write.
        let gate = Arc::new(AtomicBool::new(false));

        let mut join_set = JoinSet::new();
        let batch_size = claimed.len();

        for record in claimed {
            let semaphore = semaphore.clone();
            let gate = gate.clone();
            let executor = self.executor.clone();
            let vault = self.vault.clone();
            let to = destination.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if gate.load(Ordering::Acquire) {
                    return (record.escrow_id, false);
                }
                let success = release_one(&executor, vault.as_ref(), &record, &to).await;
                (record.escrow_id, success)
            });
        }

        let mut outcomes = Vec::with_capacity(batch_size);
        let mut deadline_hit = false;
        loop {
            tokio::select! {
                joined = join_set.join_next() => match joined {
                    Some(Ok(pair)) => outcomes.push(pair),
                    Some(Err(e)) => {
                        // The escrow gets no outcome; the sweep rule fails it
                        tracing::error!(error = %e, "Release task failed");
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline), if !deadline_hit => {
                    tracing::warn!(
                        pending = batch_size - outcomes.len(),
                        deadline_ms = self.config.batch_deadline_ms,
                        "Release batch deadline reached, closing admission"
                    );
                    deadline_hit = true;
                    gate.store(true, Ordering::Release);
                }
            }
        }

        outcomes
    }

    /// Reconcile release outcomes into authoritative status transitions.
    ///
    /// Completed/Failed are applied in bulk, `released_sum` covers exactly
    /// the escrows reaching Completed in this pass, and any escrow left
    /// Processing is force-failed so nothing stays stuck.
    pub async fn reconcile(&self, outcomes: Vec<(Uuid, bool)>) -> Result<ReleaseReport> {
        Ok(self.pool.reconcile(outcomes).await?)
    }

    /// Claim, release, and reconcile in one cycle.
    pub async fn run_release_cycle(&self) -> Result<ReleaseReport> {
        let claimed = self.claim_registered_batch().await?;
        if claimed.is_empty() {
            tracing::info!("No registered escrows to release");
            return Ok(ReleaseReport::default());
        }

        tracing::info!(count = claimed.len(), "Starting escrow release batch");

        let outcomes = self.release_batch(claimed).await;
        let report = self.reconcile(outcomes).await?;

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            released_sum = %report.released_sum,
            "Escrow release cycle complete"
        );

        Ok(report)
    }

    /// Aggregate escrow statistics.
    pub async fn summary(&self) -> Result<EscrowSummary> {
        Ok(self.pool.escrow_summary().await?)
    }
}

/// Release one escrow: decrypt, verify, submit. Never panics or errors out;
/// every failure maps to `false` and is already audited or logged.
async fn release_one(
    executor: &TransactionExecutor,
    vault: &dyn SecretStore,
    record: &EscrowRecord,
    destination: &WalletAddress,
) -> bool {
    let fulfillment = match vault.decrypt(&record.encrypted_fulfillment) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(escrow_id = %record.escrow_id, error = %e, "Fulfillment not UTF-8");
                return false;
            }
        },
        Err(e) => {
            tracing::warn!(escrow_id = %record.escrow_id, error = %e, "Fulfillment decryption failed");
            return false;
        }
    };

    if !conditions::verify(&record.condition, &fulfillment) {
        tracing::warn!(escrow_id = %record.escrow_id, "Fulfillment does not satisfy condition");
        return false;
    }

    match executor
        .submit_payment(&record.owner_wallet, destination, record.amount)
        .await
    {
        Ok(outcome) => outcome.success,
        Err(e) => {
            tracing::error!(escrow_id = %record.escrow_id, error = %e, "Audit persistence failed");
            false
        }
    }
}
