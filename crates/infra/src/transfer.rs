//! Federated time-credit transfers.
//!
//! A transfer is gated by the permission gateway, then posted to the wallet
//! ledger as one unit: the sender debit, the receiver credit and the
//! federation record either all land or none do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use hourbridge_core::{TenantId, UserId};
use hourbridge_federation::{TransferAmount, Verdict};

use crate::audit::{AuditCategory, AuditEntry, AuditLevel, AuditLog, AuditStatus};
use crate::clock::Clock;
use crate::error::{FederationError, StoreError};
use crate::gateway::{Outcome, PermissionGateway};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransferError {
    #[error("transfer denied at {} layer: {}", .0.denied_at_layer, .0.reason)]
    Denied(Verdict),

    #[error("invalid transfer: {0}")]
    Invalid(String),

    #[error("insufficient balance: {available} available, {requested} requested (hundredths of an hour)")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error(transparent)]
    Federation(#[from] FederationError),
}

impl From<StoreError> for TransferError {
    fn from(value: StoreError) -> Self {
        TransferError::Federation(value.into())
    }
}

/// One side of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletRef {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

/// Durable record of a cross-tenant transfer, written with the postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationRecord {
    pub id: Uuid,
    pub sender: WalletRef,
    pub receiver: WalletRef,
    pub amount: TransferAmount,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ports
// ─────────────────────────────────────────────────────────────────────────────

pub trait FederationRecordSink: Send + Sync {
    fn store(&self, record: &FederationRecord) -> Result<(), StoreError>;
}

impl<S> FederationRecordSink for Arc<S>
where
    S: FederationRecordSink + ?Sized,
{
    fn store(&self, record: &FederationRecord) -> Result<(), StoreError> {
        (**self).store(record)
    }
}

pub trait WalletLedger: Send + Sync {
    /// Balance in hundredths of an hour; unknown wallets read as zero.
    fn balance(&self, wallet: WalletRef) -> Result<i64, StoreError>;

    /// Debit the sender, credit the receiver and store `record` through
    /// `sink`, all or nothing.
    fn post_transfer(&self, record: &FederationRecord, sink: &dyn FederationRecordSink) -> Result<(), TransferError>;
}

impl<L> WalletLedger for Arc<L>
where
    L: WalletLedger + ?Sized,
{
    fn balance(&self, wallet: WalletRef) -> Result<i64, StoreError> {
        (**self).balance(wallet)
    }

    fn post_transfer(&self, record: &FederationRecord, sink: &dyn FederationRecordSink) -> Result<(), TransferError> {
        (**self).post_transfer(record, sink)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory adapters
// ─────────────────────────────────────────────────────────────────────────────

/// Single-lock ledger. The lock covers the balance check, the record write
/// and both postings, so concurrent transfers serialize per ledger.
#[derive(Debug, Default)]
pub struct InMemoryWalletLedger {
    balances: Mutex<HashMap<WalletRef, i64>>,
}

impl InMemoryWalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, wallet: WalletRef, hundredths: i64) -> Result<(), StoreError> {
        let mut balances = self.balances.lock().map_err(|_| StoreError::poisoned("wallet ledger"))?;
        *balances.entry(wallet).or_insert(0) += hundredths;
        Ok(())
    }
}

impl WalletLedger for InMemoryWalletLedger {
    fn balance(&self, wallet: WalletRef) -> Result<i64, StoreError> {
        let balances = self.balances.lock().map_err(|_| StoreError::poisoned("wallet ledger"))?;
        Ok(balances.get(&wallet).copied().unwrap_or(0))
    }

    fn post_transfer(&self, record: &FederationRecord, sink: &dyn FederationRecordSink) -> Result<(), TransferError> {
        let mut balances = self.balances.lock().map_err(|_| StoreError::poisoned("wallet ledger"))?;
        let requested = record.amount.hundredths();
        let available = balances.get(&record.sender).copied().unwrap_or(0);
        if available < requested {
            return Err(TransferError::InsufficientFunds { available, requested });
        }

        // Nothing has been posted yet, so a failing record write leaves no trace.
        sink.store(record)?;

        balances.insert(record.sender, available - requested);
        *balances.entry(record.receiver).or_insert(0) += requested;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFederationRecordSink {
    records: RwLock<Vec<FederationRecord>>,
    failing: AtomicBool,
}

impl InMemoryFederationRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<FederationRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }
}

impl FederationRecordSink for InMemoryFederationRecordSink {
    fn store(&self, record: &FederationRecord) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("federation record store offline".into()));
        }
        let mut records = self.records.write().map_err(|_| StoreError::poisoned("federation records"))?;
        records.push(record.clone());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub sender: WalletRef,
    pub receiver: WalletRef,
    pub amount_hours: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedTransaction {
    pub record: FederationRecord,
    /// Audit state of the gateway decision that allowed the transfer.
    pub audit: AuditStatus,
}

pub struct FederatedTransactionService<L, R> {
    gateway: Arc<PermissionGateway>,
    ledger: L,
    records: R,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl<L, R> core::fmt::Debug for FederatedTransactionService<L, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FederatedTransactionService").finish_non_exhaustive()
    }
}

impl<L, R> FederatedTransactionService<L, R>
where
    L: WalletLedger,
    R: FederationRecordSink,
{
    pub fn new(
        gateway: Arc<PermissionGateway>,
        ledger: L,
        records: R,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            ledger,
            records,
            audit,
            clock,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn create_federated_transaction(&self, request: TransferRequest) -> Result<FederatedTransaction, TransferError> {
        let decision = self.gateway.can_perform_transaction(
            request.sender.user_id,
            request.sender.tenant_id,
            request.receiver.user_id,
            request.receiver.tenant_id,
            request.amount_hours,
        )?;
        match &decision.outcome {
            Outcome::Invalid { reason } => return Err(TransferError::Invalid(reason.clone())),
            Outcome::Verdict(v) if !v.allowed => return Err(TransferError::Denied(v.clone())),
            Outcome::Verdict(_) => {}
        }

        let amount = TransferAmount::from_hours(request.amount_hours)
            .map_err(|e| TransferError::Invalid(e.to_string()))?;
        let record = FederationRecord {
            id: Uuid::now_v7(),
            sender: request.sender,
            receiver: request.receiver,
            amount,
            description: request.description,
            created_at: self.clock.now(),
        };

        self.ledger.post_transfer(&record, &self.records)?;
        info!(
            transaction_id = %record.id,
            sender_tenant = %record.sender.tenant_id,
            receiver_tenant = %record.receiver.tenant_id,
            amount = %record.amount,
            "federated transaction posted"
        );

        let entry = AuditEntry::new(
            "federation.transaction.created",
            AuditCategory::Transaction,
            AuditLevel::Info,
            record.created_at,
        )
        .source(record.sender.tenant_id)
        .target(record.receiver.tenant_id)
        .actor(record.sender.user_id)
        .data(json!({ "record": record }));
        let audit = match self.audit.record(entry) {
            Ok(()) => decision.audit,
            Err(err) => {
                warn!(transaction_id = %record.id, error = %err, "audit write failed after transfer");
                AuditStatus::Degraded
            }
        };

        Ok(FederatedTransaction { record, audit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> WalletRef {
        WalletRef {
            tenant_id: TenantId::new(),
            user_id: UserId::new(),
        }
    }

    fn record(sender: WalletRef, receiver: WalletRef, hundredths: i64) -> FederationRecord {
        FederationRecord {
            id: Uuid::now_v7(),
            sender,
            receiver,
            amount: TransferAmount::from_hundredths(hundredths).unwrap(),
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn failing_record_write_rolls_back_both_postings() {
        let ledger = InMemoryWalletLedger::new();
        let sink = InMemoryFederationRecordSink::new();
        let (a, b) = (wallet(), wallet());
        ledger.deposit(a, 1_000).unwrap();

        sink.set_failing(true);
        let err = ledger.post_transfer(&record(a, b, 300), &sink).unwrap_err();
        assert!(matches!(err, TransferError::Federation(FederationError::Store(_))));
        assert_eq!(ledger.balance(a).unwrap(), 1_000);
        assert_eq!(ledger.balance(b).unwrap(), 0);
        assert!(sink.records().is_empty());

        sink.set_failing(false);
        ledger.post_transfer(&record(a, b, 300), &sink).unwrap();
        assert_eq!(ledger.balance(a).unwrap(), 700);
        assert_eq!(ledger.balance(b).unwrap(), 300);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn overdraft_is_refused() {
        let ledger = InMemoryWalletLedger::new();
        let sink = InMemoryFederationRecordSink::new();
        let (a, b) = (wallet(), wallet());
        ledger.deposit(a, 200).unwrap();

        let err = ledger.post_transfer(&record(a, b, 300), &sink).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientFunds {
                available: 200,
                requested: 300
            }
        );
    }

    #[test]
    fn concurrent_transfers_never_overdraw() {
        let ledger = InMemoryWalletLedger::new();
        let sink = InMemoryFederationRecordSink::new();
        let (a, b) = (wallet(), wallet());
        ledger.deposit(a, 1_000).unwrap();

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..20)
                .map(|_| scope.spawn(|| ledger.post_transfer(&record(a, b, 300), &sink).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count() as i64
        });

        let remaining = ledger.balance(a).unwrap();
        assert_eq!(successes, 3);
        assert!(remaining >= 0);
        assert_eq!(successes * 300 + remaining, 1_000);
        assert_eq!(sink.records().len() as i64, successes);
    }
}
