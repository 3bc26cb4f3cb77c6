//! Administrative service facade
//!
//! Ties the pool, the escrow engine, and the distribution orchestrator
//! together behind the operations an admin surface exposes: recording
//! donations, checking balances, triggering escrow release cycles, and
//! kicking off region-wide payout distributions as background jobs.

use crate::job::{cancel_pair, BackgroundJob};
use crate::orchestrator::{DistributionOrchestrator, DistributionSummary};
use crate::{Config, Error, Result};
use escrow_engine::EscrowLifecycleManager;
use pool_ledger::types::{
    Amount, DisasterTrigger, EscrowSummary, ReleaseReport, TransactionAuditRecord, WalletAddress,
};
use pool_ledger::{LedgerClient, LedgerEscrow, PoolHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Immediate acknowledgement returned while a distribution runs in the
/// background
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributeAck {
    /// Human-readable status line
    pub message: String,

    /// Region being paid out
    pub region: String,

    /// Recipients the batch will attempt
    pub affected_user_count: usize,

    /// `share * affected_user_count`; the final total may be lower if
    /// transfers fail
    pub estimated_total: Amount,
}

/// Outcome of a disaster trigger: escrow release plus the follow-on payout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliefCycleReport {
    /// Escrow release reconciliation
    pub release: ReleaseReport,

    /// Payout of the released funds; None when nothing was released or the
    /// region has no recipients
    pub distribution: Option<DistributionSummary>,
}

/// Admin operations over the donation pool
pub struct AdminService {
    pool: PoolHandle,
    client: Arc<dyn LedgerClient>,
    escrows: Arc<EscrowLifecycleManager>,
    orchestrator: Arc<DistributionOrchestrator>,
    config: Config,
}

impl AdminService {
    /// Create a new admin service
    pub fn new(
        pool: PoolHandle,
        client: Arc<dyn LedgerClient>,
        escrows: Arc<EscrowLifecycleManager>,
        orchestrator: Arc<DistributionOrchestrator>,
        config: Config,
    ) -> Self {
        Self {
            pool,
            client,
            escrows,
            orchestrator,
            config,
        }
    }

    /// Record a confirmed inbound donation, crediting the pool and auditing
    /// the transfer in one atomic step. Returns the new pool total.
    pub async fn record_donation(
        &self,
        donor: WalletAddress,
        amount: Amount,
        tx_hash: impl Into<String>,
    ) -> Result<Amount> {
        if amount.is_zero() {
            return Err(Error::Validation(
                "Donation amount must be positive".to_string(),
            ));
        }

        let central = WalletAddress::new(self.config.central_wallet.clone());
        let audit = TransactionAuditRecord::success(donor.clone(), central, amount, tx_hash);
        let total = self.pool.credit_pool(amount, Some(audit)).await?;

        tracing::info!(%donor, %amount, pool_total = %total, "Donation recorded");
        Ok(total)
    }

    /// Authoritative pool total from the ledger store
    pub async fn pool_total(&self) -> Result<Amount> {
        Ok(self.pool.pool_total().await?)
    }

    /// Balance of the central wallet on the external ledger.
    ///
    /// Reported alongside [`Self::pool_total`] so operators can spot drift
    /// between the authoritative pool and the on-ledger funds.
    pub async fn central_wallet_balance(&self) -> Result<Amount> {
        let central = WalletAddress::new(self.config.central_wallet.clone());
        self.client
            .get_balance(&central)
            .await
            .map_err(|e| Error::ExternalService(e.to_string()))
    }

    /// Aggregate escrow statistics
    pub async fn escrow_summary(&self) -> Result<EscrowSummary> {
        Ok(self.escrows.summary().await?)
    }

    /// Escrow objects on the external ledger paying into the central wallet.
    ///
    /// Donors may fund escrows directly on the ledger, so this is the view to
    /// cross-check local records against what actually exists out there.
    pub async fn ledger_escrows(&self) -> Result<Vec<LedgerEscrow>> {
        let central = WalletAddress::new(self.config.central_wallet.clone());
        self.client
            .find_escrows(&central)
            .await
            .map_err(|e| Error::ExternalService(e.to_string()))
    }

    /// Distribute `amount` from the pool across all recipients in `region`.
    ///
    /// Validates everything that can fail fast (recipients, share size, pool
    /// balance), then spawns the batch as a cancellable background job and
    /// returns an acknowledgement immediately.
    pub async fn distribute(
        &self,
        region: &str,
        amount: Amount,
    ) -> Result<(DistributeAck, BackgroundJob<DistributionSummary>)> {
        let recipients = self.orchestrator.recipients_for_region(region).await?;
        let count = recipients.len();

        let (share, _) = amount
            .split_evenly(count as u64)
            .ok_or_else(|| Error::Validation("Recipient count overflow".to_string()))?;
        if share.is_zero() {
            return Err(Error::Validation(format!(
                "Amount {amount} too small to split across {count} recipients"
            )));
        }

        let available = self.pool.pool_total().await?;
        if available < amount {
            return Err(Error::InsufficientFunds {
                requested: amount.drops(),
                available: available.drops(),
            });
        }

        let estimated_total = share
            .checked_mul(count as u64)
            .ok_or_else(|| Error::Validation("Distribution total overflow".to_string()))?;

        let (cancel_handle, cancel_token) = cancel_pair();
        let orchestrator = self.orchestrator.clone();
        let job = BackgroundJob::new(
            tokio::spawn(async move {
                orchestrator.distribute(amount, recipients, cancel_token).await
            }),
            cancel_handle,
        );

        let ack = DistributeAck {
            message: format!("Distribution of {amount} to {count} recipients started"),
            region: region.to_string(),
            affected_user_count: count,
            estimated_total,
        };

        tracing::info!(region, %amount, recipients = count, "Distribution job started");
        Ok((ack, job))
    }

    /// React to a disaster trigger: release every registered escrow, then
    /// distribute the released funds to recipients in the trigger's region.
    ///
    /// Runs in the background; the payout step is skipped (not failed) when
    /// the release yields nothing or the region has no recipients.
    pub async fn trigger_release(
        &self,
        trigger: DisasterTrigger,
    ) -> Result<BackgroundJob<ReliefCycleReport>> {
        let escrows = self.escrows.clone();
        let orchestrator = self.orchestrator.clone();
        let pool = self.pool.clone();
        let region = trigger.region.clone();

        let (cancel_handle, cancel_token) = cancel_pair();
        let job = BackgroundJob::new(
            tokio::spawn(async move {
                tracing::info!(
                    disaster_type = %trigger.disaster_type,
                    region = %region,
                    threshold = trigger.threshold,
                    "Disaster trigger received"
                );

                let release = escrows.run_release_cycle().await?;
                if !release.released_sum.is_zero() {
                    // Released funds land in the central wallet; mirror them
                    // into the authoritative pool before paying out.
                    pool.credit_pool(release.released_sum, None).await?;
                }

                if release.released_sum.is_zero() {
                    return Ok(ReliefCycleReport {
                        release,
                        distribution: None,
                    });
                }

                let distribution = match orchestrator.recipients_for_region(&region).await {
                    Ok(recipients) => match orchestrator
                        .distribute(release.released_sum, recipients, cancel_token)
                        .await
                    {
                        Ok(summary) => Some(summary),
                        Err(Error::Validation(msg)) => {
                            // e.g. released sum too small to split; funds
                            // stay pooled for the next cycle
                            tracing::warn!(region, reason = %msg, "Released funds held");
                            None
                        }
                        Err(e) => return Err(e),
                    },
                    Err(Error::NoRecipients(region)) => {
                        tracing::warn!(region, "Released funds held: no recipients in region");
                        None
                    }
                    Err(e) => return Err(e),
                };

                Ok(ReliefCycleReport {
                    release,
                    distribution,
                })
            }),
            cancel_handle,
        );

        Ok(job)
    }
}
