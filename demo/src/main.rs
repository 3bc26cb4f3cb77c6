//! End-to-end relief flow demo against an in-process mock ledger.
//!
//! Walks the full pipeline: donations fund conditional escrows, a disaster
//! trigger releases them into the central pool, and the pool is distributed
//! across the affected region's recipients.

use distribution::{AdminService, DistributionOrchestrator, StaticDirectory};
use escrow_engine::{EscrowLifecycleManager, FulfillmentVault};
use pool_ledger::client::testing::MockLedgerClient;
use pool_ledger::types::{Amount, DisasterTrigger, Recipient, WalletAddress};
use pool_ledger::{spawn_pool_actor, Storage, TransactionExecutor};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CENTRAL_WALLET: &str = "rReliefRailCentralPool";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("ReliefRail demo starting");

    let data_dir = tempfile::tempdir()?;
    let mut ledger_config = pool_ledger::Config::default();
    ledger_config.data_dir = data_dir.path().to_path_buf();
    ledger_config.central_wallet = CENTRAL_WALLET.to_string();

    let storage = Arc::new(Storage::open(&ledger_config)?);
    let pool = spawn_pool_actor(storage, ledger_config.mailbox_capacity);

    let client = Arc::new(MockLedgerClient::new());
    client.set_balance(&WalletAddress::new(CENTRAL_WALLET), Amount::from_drops(0));
    let executor =
        TransactionExecutor::new(client.clone(), pool.clone(), Duration::from_secs(5));

    let vault = Arc::new(FulfillmentVault::new(&[0x52u8; 32]));
    let escrows = Arc::new(EscrowLifecycleManager::new(
        pool.clone(),
        executor.clone(),
        vault,
        escrow_engine::Config {
            central_wallet: CENTRAL_WALLET.to_string(),
            ..escrow_engine::Config::default()
        },
    ));

    let directory = Arc::new(StaticDirectory::new());
    for user_id in 1..=4 {
        directory.add(Recipient {
            user_id,
            wallet_address: WalletAddress::new(format!("rRecipient{user_id}")),
            region: "sylhet".to_string(),
        });
    }

    let dist_config = distribution::Config {
        central_wallet: CENTRAL_WALLET.to_string(),
        ..distribution::Config::default()
    };
    let orchestrator = Arc::new(DistributionOrchestrator::new(
        pool.clone(),
        executor,
        directory.clone(),
        dist_config.clone(),
    ));
    let admin = AdminService::new(
        pool.clone(),
        client,
        escrows.clone(),
        orchestrator,
        dist_config,
    );

    // Donors fund conditional escrows against a flood trigger
    let trigger = DisasterTrigger {
        disaster_type: "flood".to_string(),
        region: "sylhet".to_string(),
        threshold: 120,
    };
    for (donor, drops) in [("rDonorAlice", 600_000), ("rDonorBob", 250_000), ("rDonorCarol", 150_000)] {
        let record = escrows
            .register_escrow(
                WalletAddress::new(donor),
                Amount::from_drops(drops),
                trigger.clone(),
            )
            .await?;
        info!(escrow_id = %record.escrow_id, donor, drops, "Escrow registered");
    }

    let summary = admin.escrow_summary().await?;
    info!(
        total_escrows = summary.total_escrows,
        total_amount = %summary.total_amount,
        "Escrows funded, waiting on trigger"
    );

    // The trigger fires: release everything, then pay out the region
    let report = admin.trigger_release(trigger).await?.join().await?;
    info!(
        released = %report.release.released_sum,
        succeeded = report.release.succeeded,
        failed = report.release.failed,
        "Release cycle done"
    );

    if let Some(dist) = report.distribution {
        info!(
            attempted = dist.attempted,
            succeeded = dist.succeeded,
            share = %dist.share,
            distributed_total = %dist.distributed_total,
            remainder = %dist.remainder,
            "Distribution done"
        );
        for user_id in 1..=4 {
            info!(
                user_id,
                mirrored = %directory.mirrored_balance(user_id),
                "Recipient balance"
            );
        }
    }

    info!(pool_total = %admin.pool_total().await?, "Demo complete");
    pool.shutdown().await?;
    Ok(())
}
