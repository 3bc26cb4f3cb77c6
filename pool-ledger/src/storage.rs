//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `escrows` - Escrow records (key: escrow_id)
//! - `audit` - Append-only transaction audit log (key: record_id, UUIDv7)
//! - `pool` - Donation pool singleton row (key: "total")
//! - `indices` - Status index for escrow scans (key: status_byte || escrow_id)
//!
//! Every multi-key mutation commits through a single `WriteBatch`, so one
//! logical outcome (balance update + audit record + escrow status) either
//! persists completely or not at all.
//!
//! Mutating methods perform read-modify-write cycles and are only safe under
//! the single-writer discipline enforced by [`crate::actor`].

use crate::{
    error::{Error, Result},
    types::{
        Amount, EscrowRecord, EscrowStatus, EscrowSummary, ReleaseReport, TransactionAuditRecord,
    },
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ESCROWS: &str = "escrows";
const CF_AUDIT: &str = "audit";
const CF_POOL: &str = "pool";
const CF_INDICES: &str = "indices";

/// Singleton key for the pool total
const POOL_TOTAL_KEY: &[u8] = b"total";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ESCROWS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_AUDIT, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_POOL, Options::default()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened pool ledger storage");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn status_index_key(status: EscrowStatus, escrow_id: &Uuid) -> Vec<u8> {
        let mut key = vec![status.as_u8()];
        key.extend_from_slice(escrow_id.as_bytes());
        key
    }

    /// Stage an escrow write (record + status index) into a batch
    fn stage_escrow(
        &self,
        batch: &mut WriteBatch,
        record: &EscrowRecord,
        old_status: Option<EscrowStatus>,
    ) -> Result<()> {
        let cf_escrows = self.cf_handle(CF_ESCROWS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let value = bincode::serialize(record)?;
        batch.put_cf(cf_escrows, record.escrow_id.as_bytes(), &value);

        if let Some(old) = old_status {
            if old != record.status {
                batch.delete_cf(cf_indices, Self::status_index_key(old, &record.escrow_id));
            }
        }
        batch.put_cf(
            cf_indices,
            Self::status_index_key(record.status, &record.escrow_id),
            [],
        );

        Ok(())
    }

    fn stage_audit(&self, batch: &mut WriteBatch, record: &TransactionAuditRecord) -> Result<()> {
        let cf_audit = self.cf_handle(CF_AUDIT)?;
        let value = bincode::serialize(record)?;
        batch.put_cf(cf_audit, record.record_id.as_bytes(), &value);
        Ok(())
    }

    fn stage_pool_total(&self, batch: &mut WriteBatch, total: Amount) -> Result<()> {
        let cf_pool = self.cf_handle(CF_POOL)?;
        batch.put_cf(cf_pool, POOL_TOTAL_KEY, total.drops().to_be_bytes());
        Ok(())
    }

    // Escrow operations

    /// Persist a newly registered escrow
    pub fn register_escrow(&self, record: &EscrowRecord) -> Result<()> {
        if record.status != EscrowStatus::Registered {
            return Err(Error::Validation(format!(
                "New escrow must be Registered, got {}",
                record.status
            )));
        }

        let mut batch = WriteBatch::default();
        self.stage_escrow(&mut batch, record, None)?;
        self.db.write(batch)?;

        tracing::debug!(
            escrow_id = %record.escrow_id,
            amount = %record.amount,
            "Escrow registered"
        );

        Ok(())
    }

    /// Get escrow by ID
    pub fn get_escrow(&self, escrow_id: Uuid) -> Result<EscrowRecord> {
        let cf = self.cf_handle(CF_ESCROWS)?;

        let value = self
            .db
            .get_cf(cf, escrow_id.as_bytes())?
            .ok_or_else(|| Error::EscrowNotFound(escrow_id.to_string()))?;

        let record: EscrowRecord = bincode::deserialize(&value)?;
        Ok(record)
    }

    /// List escrows currently in `status` (via the status index)
    pub fn escrows_by_status(&self, status: EscrowStatus) -> Result<Vec<EscrowRecord>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = [status.as_u8()];

        let iter = self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(&prefix, rocksdb::Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, _) = item?;

            // Index keys sort by status byte; stop at the next status
            if key.first() != Some(&status.as_u8()) {
                break;
            }
            if key.len() < 17 {
                continue;
            }

            let id_bytes: [u8; 16] = key[1..17]
                .try_into()
                .map_err(|_| Error::Storage("Malformed status index key".to_string()))?;
            records.push(self.get_escrow(Uuid::from_bytes(id_bytes))?);
        }

        Ok(records)
    }

    /// Atomically transition all Registered escrows to Processing.
    ///
    /// Runs as one `WriteBatch`, so a second batch starting afterwards finds
    /// no Registered escrows and cannot double-release any of them.
    pub fn claim_registered(&self) -> Result<Vec<EscrowRecord>> {
        let registered = self.escrows_by_status(EscrowStatus::Registered)?;
        if registered.is_empty() {
            return Ok(vec![]);
        }

        let mut batch = WriteBatch::default();
        let mut claimed = Vec::with_capacity(registered.len());

        for mut record in registered {
            let old = record.status;
            record.status = EscrowStatus::Processing;
            self.stage_escrow(&mut batch, &record, Some(old))?;
            claimed.push(record);
        }

        self.db.write(batch)?;

        tracing::info!(count = claimed.len(), "Claimed registered escrows for release");

        Ok(claimed)
    }

    /// Cancel an escrow (only valid before a batch claims it)
    pub fn cancel_escrow(&self, escrow_id: Uuid) -> Result<EscrowRecord> {
        let mut record = self.get_escrow(escrow_id)?;

        if !record.status.can_transition(EscrowStatus::Cancelled) {
            return Err(Error::InvalidTransition {
                from: record.status,
                to: EscrowStatus::Cancelled,
            });
        }

        let old = record.status;
        record.status = EscrowStatus::Cancelled;

        let mut batch = WriteBatch::default();
        self.stage_escrow(&mut batch, &record, Some(old))?;
        self.db.write(batch)?;

        tracing::info!(escrow_id = %escrow_id, "Escrow cancelled");

        Ok(record)
    }

    /// Reconcile release-batch outcomes into authoritative status transitions.
    ///
    /// Partitions `(escrow_id, success)` pairs, bulk-updates statuses, and
    /// computes the released sum over escrows reaching Completed in this pass.
    /// Any escrow still Processing afterwards (outcome never arrived) is swept
    /// to Failed. Escrows already in a terminal state are skipped, which makes
    /// re-running reconciliation a no-op.
    pub fn reconcile_outcomes(&self, outcomes: &[(Uuid, bool)]) -> Result<ReleaseReport> {
        let mut batch = WriteBatch::default();
        let mut report = ReleaseReport::default();
        let mut touched: HashSet<Uuid> = HashSet::with_capacity(outcomes.len());

        for &(escrow_id, success) in outcomes {
            let mut record = self.get_escrow(escrow_id)?;

            if record.status != EscrowStatus::Processing {
                tracing::debug!(
                    escrow_id = %escrow_id,
                    status = %record.status,
                    "Skipping outcome for escrow not in Processing"
                );
                touched.insert(escrow_id);
                continue;
            }

            let old = record.status;
            record.status = if success {
                EscrowStatus::Completed
            } else {
                EscrowStatus::Failed
            };

            if success {
                report.succeeded += 1;
                report.released_sum = report
                    .released_sum
                    .checked_add(record.amount)
                    .ok_or_else(|| Error::Validation("Released sum overflow".to_string()))?;
            } else {
                report.failed += 1;
            }

            self.stage_escrow(&mut batch, &record, Some(old))?;
            touched.insert(escrow_id);
        }

        // Sweep rule: no escrow stays Processing after a batch completes
        for mut record in self.escrows_by_status(EscrowStatus::Processing)? {
            if touched.contains(&record.escrow_id) {
                continue;
            }

            tracing::warn!(
                escrow_id = %record.escrow_id,
                "Sweeping orphaned Processing escrow to Failed"
            );

            let old = record.status;
            record.status = EscrowStatus::Failed;
            report.failed += 1;
            self.stage_escrow(&mut batch, &record, Some(old))?;
        }

        report.total = report.succeeded + report.failed;
        self.db.write(batch)?;

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            released_sum = %report.released_sum,
            "Release batch reconciled"
        );

        Ok(report)
    }

    /// Aggregate escrow statistics (full scan)
    pub fn escrow_summary(&self) -> Result<EscrowSummary> {
        let cf = self.cf_handle(CF_ESCROWS)?;
        let mut summary = EscrowSummary::default();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let record: EscrowRecord = bincode::deserialize(&value)?;

            summary.total_escrows += 1;
            summary.total_amount = summary.total_amount.saturating_add(record.amount);
            *summary
                .by_status
                .entry(record.status.as_str().to_string())
                .or_insert(0) += 1;
            *summary
                .by_disaster_type
                .entry(record.disaster.disaster_type.clone())
                .or_insert(0) += 1;
        }

        Ok(summary)
    }

    // Audit log operations

    /// Append one audit record (never updated afterwards)
    pub fn append_audit(&self, record: &TransactionAuditRecord) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_audit(&mut batch, record)?;
        self.db.write(batch)?;
        Ok(())
    }

    /// All audit records in insertion (time) order
    pub fn audit_records(&self) -> Result<Vec<TransactionAuditRecord>> {
        let cf = self.cf_handle(CF_AUDIT)?;
        let mut records = Vec::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }

        Ok(records)
    }

    // Pool operations

    /// Current pool total (zero if never credited)
    pub fn pool_total(&self) -> Result<Amount> {
        let cf = self.cf_handle(CF_POOL)?;

        let total = match self.db.get_cf(cf, POOL_TOTAL_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed pool total".to_string()))?;
                Amount::from_drops(u64::from_be_bytes(raw))
            }
            None => Amount::ZERO,
        };

        Ok(total)
    }

    /// Credit the pool, optionally with the audit record of the donation.
    ///
    /// Balance update and audit record commit in one batch.
    pub fn credit_pool(
        &self,
        amount: Amount,
        audit: Option<&TransactionAuditRecord>,
    ) -> Result<Amount> {
        let total = self.pool_total()?;
        let new_total = total
            .checked_add(amount)
            .ok_or_else(|| Error::Validation("Pool total overflow".to_string()))?;

        let mut batch = WriteBatch::default();
        self.stage_pool_total(&mut batch, new_total)?;
        if let Some(record) = audit {
            self.stage_audit(&mut batch, record)?;
        }
        self.db.write(batch)?;

        tracing::debug!(credited = %amount, total = %new_total, "Pool credited");

        Ok(new_total)
    }

    /// Debit the pool, refusing any debit that would drive the total negative.
    pub fn debit_pool(&self, amount: Amount) -> Result<Amount> {
        let total = self.pool_total()?;
        let new_total = total.checked_sub(amount).ok_or(Error::InsufficientFunds {
            requested: amount.drops(),
            available: total.drops(),
        })?;

        let mut batch = WriteBatch::default();
        self.stage_pool_total(&mut batch, new_total)?;
        self.db.write(batch)?;

        tracing::debug!(debited = %amount, total = %new_total, "Pool debited");

        Ok(new_total)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("Pool ledger storage closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisasterTrigger, WalletAddress};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn test_escrow(amount: u64) -> EscrowRecord {
        EscrowRecord {
            escrow_id: Uuid::new_v4(),
            owner_wallet: WalletAddress::new("rDonor"),
            amount: Amount::from_drops(amount),
            condition: "C".repeat(64),
            encrypted_fulfillment: vec![0xAB; 48],
            disaster: DisasterTrigger {
                disaster_type: "flood".to_string(),
                region: "sylhet".to_string(),
                threshold: 90,
            },
            cancel_after: Utc::now(),
            status: EscrowStatus::Registered,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_register_and_get_escrow() {
        let (storage, _temp) = test_storage();

        let record = test_escrow(100);
        storage.register_escrow(&record).unwrap();

        let retrieved = storage.get_escrow(record.escrow_id).unwrap();
        assert_eq!(retrieved.escrow_id, record.escrow_id);
        assert_eq!(retrieved.amount, Amount::from_drops(100));
        assert_eq!(retrieved.status, EscrowStatus::Registered);
    }

    #[test]
    fn test_register_rejects_non_registered_status() {
        let (storage, _temp) = test_storage();

        let mut record = test_escrow(100);
        record.status = EscrowStatus::Processing;
        assert!(storage.register_escrow(&record).is_err());
    }

    #[test]
    fn test_claim_flips_all_registered() {
        let (storage, _temp) = test_storage();

        for _ in 0..3 {
            storage.register_escrow(&test_escrow(50)).unwrap();
        }

        let claimed = storage.claim_registered().unwrap();
        assert_eq!(claimed.len(), 3);
        assert!(claimed.iter().all(|e| e.status == EscrowStatus::Processing));

        // Second claim finds nothing: no double release
        assert!(storage.claim_registered().unwrap().is_empty());
        assert_eq!(
            storage.escrows_by_status(EscrowStatus::Processing).unwrap().len(),
            3
        );
    }

    #[test]
    fn test_cancel_only_before_claim() {
        let (storage, _temp) = test_storage();

        let record = test_escrow(70);
        storage.register_escrow(&record).unwrap();
        storage.cancel_escrow(record.escrow_id).unwrap();

        let cancelled = storage.get_escrow(record.escrow_id).unwrap();
        assert_eq!(cancelled.status, EscrowStatus::Cancelled);

        // Claimed escrows cannot be cancelled
        let other = test_escrow(70);
        storage.register_escrow(&other).unwrap();
        storage.claim_registered().unwrap();
        let err = storage.cancel_escrow(other.escrow_id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_reconcile_partitions_and_sums() {
        let (storage, _temp) = test_storage();

        let a = test_escrow(100);
        let b = test_escrow(40);
        let c = test_escrow(60);
        for record in [&a, &b, &c] {
            storage.register_escrow(record).unwrap();
        }
        storage.claim_registered().unwrap();

        let report = storage
            .reconcile_outcomes(&[(a.escrow_id, true), (b.escrow_id, false), (c.escrow_id, true)])
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.released_sum, Amount::from_drops(160));

        assert_eq!(storage.get_escrow(a.escrow_id).unwrap().status, EscrowStatus::Completed);
        assert_eq!(storage.get_escrow(b.escrow_id).unwrap().status, EscrowStatus::Failed);
    }

    #[test]
    fn test_reconcile_sweeps_orphaned_processing() {
        let (storage, _temp) = test_storage();

        let a = test_escrow(100);
        let orphan = test_escrow(30);
        storage.register_escrow(&a).unwrap();
        storage.register_escrow(&orphan).unwrap();
        storage.claim_registered().unwrap();

        // Outcome for the orphan never arrives
        let report = storage.reconcile_outcomes(&[(a.escrow_id, true)]).unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.released_sum, Amount::from_drops(100));
        assert_eq!(
            storage.get_escrow(orphan.escrow_id).unwrap().status,
            EscrowStatus::Failed
        );
        assert!(storage.escrows_by_status(EscrowStatus::Processing).unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_idempotent() {
        let (storage, _temp) = test_storage();

        let a = test_escrow(100);
        storage.register_escrow(&a).unwrap();
        storage.claim_registered().unwrap();

        let first = storage.reconcile_outcomes(&[(a.escrow_id, true)]).unwrap();
        assert_eq!(first.released_sum, Amount::from_drops(100));

        // Re-running over already-terminal escrows counts nothing twice
        let second = storage.reconcile_outcomes(&[(a.escrow_id, true)]).unwrap();
        assert_eq!(second.total, 0);
        assert_eq!(second.released_sum, Amount::ZERO);
    }

    #[test]
    fn test_pool_credit_debit_guard() {
        let (storage, _temp) = test_storage();

        assert_eq!(storage.pool_total().unwrap(), Amount::ZERO);

        storage.credit_pool(Amount::from_drops(100), None).unwrap();
        assert_eq!(storage.pool_total().unwrap(), Amount::from_drops(100));

        storage.debit_pool(Amount::from_drops(33)).unwrap();
        assert_eq!(storage.pool_total().unwrap(), Amount::from_drops(67));

        // A debit that would go negative is refused and changes nothing
        let err = storage.debit_pool(Amount::from_drops(68)).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(storage.pool_total().unwrap(), Amount::from_drops(67));
    }

    #[test]
    fn test_audit_append_only() {
        let (storage, _temp) = test_storage();

        let from = WalletAddress::new("rCentral");
        let to = WalletAddress::new("rUser");
        storage
            .append_audit(&TransactionAuditRecord::success(
                from.clone(),
                to.clone(),
                Amount::from_drops(33),
                "HASH1",
            ))
            .unwrap();
        storage
            .append_audit(&TransactionAuditRecord::failure(from, to, Amount::from_drops(33)))
            .unwrap();

        let records = storage.audit_records().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.tx_hash.is_none()));
    }

    #[test]
    fn test_escrow_summary() {
        let (storage, _temp) = test_storage();

        storage.register_escrow(&test_escrow(100)).unwrap();
        storage.register_escrow(&test_escrow(50)).unwrap();

        let summary = storage.escrow_summary().unwrap();
        assert_eq!(summary.total_escrows, 2);
        assert_eq!(summary.total_amount, Amount::from_drops(150));
        assert_eq!(summary.by_status.get("Registered"), Some(&2));
        assert_eq!(summary.by_disaster_type.get("flood"), Some(&2));
    }
}
