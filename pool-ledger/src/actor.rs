//! Single-writer actor for the pool ledger
//!
//! Every mutation of the donation pool, the escrow table, and the audit log
//! goes through one actor task. Concurrent distribution and release paths
//! serialize at the mailbox, so two batches can never race on the same
//! balance, and each handled message commits at most one atomic `WriteBatch`.
//!
//! Handles are cheap to clone; requests get their reply over a oneshot
//! channel.

use crate::types::{
    Amount, EscrowRecord, EscrowStatus, EscrowSummary, ReleaseReport, TransactionAuditRecord,
};
use crate::{Error, Result, Storage};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the pool actor
pub enum PoolMessage {
    /// Persist a newly registered escrow
    RegisterEscrow {
        record: EscrowRecord,
        response: oneshot::Sender<Result<Uuid>>,
    },

    /// Cancel a still-Registered escrow
    CancelEscrow {
        escrow_id: Uuid,
        response: oneshot::Sender<Result<EscrowRecord>>,
    },

    /// Get escrow by ID
    GetEscrow {
        escrow_id: Uuid,
        response: oneshot::Sender<Result<EscrowRecord>>,
    },

    /// List escrows in a given status
    EscrowsByStatus {
        status: EscrowStatus,
        response: oneshot::Sender<Result<Vec<EscrowRecord>>>,
    },

    /// Atomically claim all Registered escrows for release
    ClaimRegistered {
        response: oneshot::Sender<Result<Vec<EscrowRecord>>>,
    },

    /// Reconcile release outcomes (bulk status update + sweep)
    Reconcile {
        outcomes: Vec<(Uuid, bool)>,
        response: oneshot::Sender<Result<ReleaseReport>>,
    },

    /// Credit the pool (confirmed donation), with optional audit record
    CreditPool {
        amount: Amount,
        audit: Option<TransactionAuditRecord>,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Debit the pool (confirmed distribution transfer)
    DebitPool {
        amount: Amount,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Current pool total
    PoolTotal {
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Append one audit record
    AppendAudit {
        record: TransactionAuditRecord,
        response: oneshot::Sender<Result<()>>,
    },

    /// All audit records in time order
    AuditRecords {
        response: oneshot::Sender<Result<Vec<TransactionAuditRecord>>>,
    },

    /// Aggregate escrow statistics
    EscrowSummary {
        response: oneshot::Sender<Result<EscrowSummary>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes pool messages
pub struct PoolActor {
    storage: Arc<Storage>,
    mailbox: mpsc::Receiver<PoolMessage>,
}

impl PoolActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<PoolMessage>) -> Self {
        Self { storage, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if matches!(msg, PoolMessage::Shutdown) {
                break;
            }
            self.handle_message(msg);
        }
        tracing::info!("Pool actor stopped");
    }

    fn handle_message(&mut self, msg: PoolMessage) {
        match msg {
            PoolMessage::RegisterEscrow { record, response } => {
                let escrow_id = record.escrow_id;
                let result = self.storage.register_escrow(&record).map(|_| escrow_id);
                let _ = response.send(result);
            }

            PoolMessage::CancelEscrow { escrow_id, response } => {
                let _ = response.send(self.storage.cancel_escrow(escrow_id));
            }

            PoolMessage::GetEscrow { escrow_id, response } => {
                let _ = response.send(self.storage.get_escrow(escrow_id));
            }

            PoolMessage::EscrowsByStatus { status, response } => {
                let _ = response.send(self.storage.escrows_by_status(status));
            }

            PoolMessage::ClaimRegistered { response } => {
                let _ = response.send(self.storage.claim_registered());
            }

            PoolMessage::Reconcile { outcomes, response } => {
                let _ = response.send(self.storage.reconcile_outcomes(&outcomes));
            }

            PoolMessage::CreditPool {
                amount,
                audit,
                response,
            } => {
                let _ = response.send(self.storage.credit_pool(amount, audit.as_ref()));
            }

            PoolMessage::DebitPool { amount, response } => {
                let _ = response.send(self.storage.debit_pool(amount));
            }

            PoolMessage::PoolTotal { response } => {
                let _ = response.send(self.storage.pool_total());
            }

            PoolMessage::AppendAudit { record, response } => {
                let _ = response.send(self.storage.append_audit(&record));
            }

            PoolMessage::AuditRecords { response } => {
                let _ = response.send(self.storage.audit_records());
            }

            PoolMessage::EscrowSummary { response } => {
                let _ = response.send(self.storage.escrow_summary());
            }

            PoolMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the pool actor
#[derive(Clone)]
pub struct PoolHandle {
    sender: mpsc::Sender<PoolMessage>,
}

impl PoolHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<PoolMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> PoolMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| Error::Concurrency("Pool actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Pool actor response channel closed".to_string()))?
    }

    /// Persist a newly registered escrow
    pub async fn register_escrow(&self, record: EscrowRecord) -> Result<Uuid> {
        self.request(|response| PoolMessage::RegisterEscrow { record, response })
            .await
    }

    /// Cancel a still-Registered escrow
    pub async fn cancel_escrow(&self, escrow_id: Uuid) -> Result<EscrowRecord> {
        self.request(|response| PoolMessage::CancelEscrow { escrow_id, response })
            .await
    }

    /// Get escrow by ID
    pub async fn get_escrow(&self, escrow_id: Uuid) -> Result<EscrowRecord> {
        self.request(|response| PoolMessage::GetEscrow { escrow_id, response })
            .await
    }

    /// List escrows in a given status
    pub async fn escrows_by_status(&self, status: EscrowStatus) -> Result<Vec<EscrowRecord>> {
        self.request(|response| PoolMessage::EscrowsByStatus { status, response })
            .await
    }

    /// Atomically claim all Registered escrows for release
    pub async fn claim_registered(&self) -> Result<Vec<EscrowRecord>> {
        self.request(|response| PoolMessage::ClaimRegistered { response })
            .await
    }

    /// Reconcile release outcomes
    pub async fn reconcile(&self, outcomes: Vec<(Uuid, bool)>) -> Result<ReleaseReport> {
        self.request(|response| PoolMessage::Reconcile { outcomes, response })
            .await
    }

    /// Credit the pool (confirmed donation)
    pub async fn credit_pool(
        &self,
        amount: Amount,
        audit: Option<TransactionAuditRecord>,
    ) -> Result<Amount> {
        self.request(|response| PoolMessage::CreditPool {
            amount,
            audit,
            response,
        })
        .await
    }

    /// Debit the pool (confirmed distribution transfer)
    pub async fn debit_pool(&self, amount: Amount) -> Result<Amount> {
        self.request(|response| PoolMessage::DebitPool { amount, response })
            .await
    }

    /// Current pool total
    pub async fn pool_total(&self) -> Result<Amount> {
        self.request(|response| PoolMessage::PoolTotal { response })
            .await
    }

    /// Append one audit record
    pub async fn append_audit(&self, record: TransactionAuditRecord) -> Result<()> {
        self.request(|response| PoolMessage::AppendAudit { record, response })
            .await
    }

    /// All audit records in time order
    pub async fn audit_records(&self) -> Result<Vec<TransactionAuditRecord>> {
        self.request(|response| PoolMessage::AuditRecords { response })
            .await
    }

    /// Aggregate escrow statistics
    pub async fn escrow_summary(&self) -> Result<EscrowSummary> {
        self.request(|response| PoolMessage::EscrowSummary { response })
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PoolMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Pool actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the pool actor
pub fn spawn_pool_actor(storage: Arc<Storage>, mailbox_capacity: usize) -> PoolHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = PoolActor::new(storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    PoolHandle::new(tx)
}
