//! Property-based tests for pool ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Pool non-negativity for all donation/distribution sequences
//! - Released sum equals the exact sum over Completed escrows, in any order
//! - Reconciliation idempotency
//! - Even-split conservation: share * n + remainder == total

use chrono::Utc;
use pool_ledger::{
    types::{Amount, DisasterTrigger, EscrowRecord, EscrowStatus, WalletAddress},
    Config, Storage,
};
use proptest::prelude::*;
use uuid::Uuid;

/// One step in a pool mutation sequence
#[derive(Debug, Clone)]
enum PoolOp {
    Donate(u64),
    Distribute(u64),
}

fn pool_op_strategy() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        (1u64..10_000).prop_map(PoolOp::Donate),
        (1u64..10_000).prop_map(PoolOp::Distribute),
    ]
}

fn escrow_amount_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1u64..1_000_000, 1..20)
}

fn test_storage() -> (Storage, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Storage::open(&config).unwrap(), temp_dir)
}

fn make_escrow(amount: u64) -> EscrowRecord {
    EscrowRecord {
        escrow_id: Uuid::new_v4(),
        owner_wallet: WalletAddress::new("rDonor"),
        amount: Amount::from_drops(amount),
        condition: "F".repeat(64),
        encrypted_fulfillment: vec![0x42; 32],
        disaster: DisasterTrigger {
            disaster_type: "flood".to_string(),
            region: "sylhet".to_string(),
            threshold: 100,
        },
        cancel_after: Utc::now(),
        status: EscrowStatus::Registered,
        created_at: Utc::now(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Invariant: the pool total never goes negative, whatever the sequence
    /// of donations and distribution debits; refused debits change nothing.
    #[test]
    fn prop_pool_never_negative(ops in prop::collection::vec(pool_op_strategy(), 1..40)) {
        let (storage, _temp) = test_storage();
        let mut expected: u64 = 0;

        for op in ops {
            match op {
                PoolOp::Donate(drops) => {
                    storage.credit_pool(Amount::from_drops(drops), None).unwrap();
                    expected += drops;
                }
                PoolOp::Distribute(drops) => {
                    match storage.debit_pool(Amount::from_drops(drops)) {
                        Ok(_) => {
                            prop_assert!(drops <= expected);
                            expected -= drops;
                        }
                        Err(pool_ledger::Error::InsufficientFunds { .. }) => {
                            prop_assert!(drops > expected);
                        }
                        Err(e) => return Err(TestCaseError::fail(format!("unexpected: {e}"))),
                    }
                }
            }

            prop_assert_eq!(storage.pool_total().unwrap().drops(), expected);
        }
    }

    /// Property: released_sum after reconciliation equals the exact sum of
    /// amounts of escrows reconciled to Completed, independent of the order
    /// outcomes arrive in.
    #[test]
    fn prop_released_sum_exact(
        amounts in escrow_amount_strategy(),
        success_mask in prop::collection::vec(any::<bool>(), 20),
        rotate_by in 0usize..20,
    ) {
        let (storage, _temp) = test_storage();

        let mut expected_sum: u64 = 0;
        let mut outcomes = Vec::new();
        for (i, &amount) in amounts.iter().enumerate() {
            let record = make_escrow(amount);
            let success = success_mask[i % success_mask.len()];
            if success {
                expected_sum += amount;
            }
            outcomes.push((record.escrow_id, success));
            storage.register_escrow(&record).unwrap();
        }

        storage.claim_registered().unwrap();

        // Completion order across the batch is unspecified
        let len = outcomes.len().max(1);
        outcomes.rotate_left(rotate_by % len);

        let report = storage.reconcile_outcomes(&outcomes).unwrap();
        prop_assert_eq!(report.released_sum.drops(), expected_sum);
        prop_assert_eq!(report.total, amounts.len());

        // No escrow remains Processing after the batch completes
        prop_assert!(storage.escrows_by_status(EscrowStatus::Processing).unwrap().is_empty());
    }

    /// Idempotence: re-running reconciliation over already-terminal escrows
    /// is a no-op (no double counting of released_sum).
    #[test]
    fn prop_reconcile_idempotent(amounts in escrow_amount_strategy()) {
        let (storage, _temp) = test_storage();

        let outcomes: Vec<(Uuid, bool)> = amounts
            .iter()
            .map(|&amount| {
                let record = make_escrow(amount);
                storage.register_escrow(&record).unwrap();
                (record.escrow_id, true)
            })
            .collect();

        storage.claim_registered().unwrap();

        let first = storage.reconcile_outcomes(&outcomes).unwrap();
        let second = storage.reconcile_outcomes(&outcomes).unwrap();

        prop_assert_eq!(first.released_sum.drops(), amounts.iter().sum::<u64>());
        prop_assert_eq!(second.released_sum.drops(), 0);
        prop_assert_eq!(second.total, 0);
    }

    /// Conservation: floor division leaves exactly the remainder behind,
    /// and the remainder is always smaller than the recipient count.
    #[test]
    fn prop_split_evenly_conserves(total in 0u64..u64::MAX / 2, parts in 1u64..10_000) {
        let (share, remainder) = Amount::from_drops(total).split_evenly(parts).unwrap();
        prop_assert_eq!(share.drops() * parts + remainder.drops(), total);
        prop_assert!(remainder.drops() < parts);
    }
}
