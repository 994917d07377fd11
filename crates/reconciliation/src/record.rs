//! Transaction and payment records as the upstream systems hand them over,
//! plus the tenant-scoped repository seams the engine reads them through.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tillsync_core::{LocationId, TenantId};

/// Lifecycle state of a till transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Voided,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Voided => "voided",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

/// Lifecycle state of a payment leg.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Captured,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Money actually moved. Only settled legs take part in reconciliation.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Captured | PaymentStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// One till transaction as the sales system recorded it.
///
/// `id` is the upstream identifier; payments point back at it through
/// [`PaymentRecord::transaction_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub total: f64,
    pub payment_method: String,
    pub status: TransactionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// One payment leg as the processor recorded it. Negative amounts are
/// refunds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub tenant_id: TenantId,
    pub transaction_id: String,
    pub amount: f64,
    pub method: String,
    pub status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Half-open period filter: `start <= occurred_at < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodQuery {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Fetched records plus the total match count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Backend unreachable or in a broken state.
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Read access to recorded transactions, tenant-scoped.
pub trait TransactionRepository: Send + Sync {
    fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        query: &PeriodQuery,
    ) -> Result<Page<TransactionRecord>, RepositoryError>;
}

impl<R> TransactionRepository for Arc<R>
where
    R: TransactionRepository + ?Sized,
{
    fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        query: &PeriodQuery,
    ) -> Result<Page<TransactionRecord>, RepositoryError> {
        (**self).find_by_tenant(tenant_id, query)
    }
}

/// Read access to recorded payments, tenant-scoped.
pub trait PaymentRepository: Send + Sync {
    fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        query: &PeriodQuery,
    ) -> Result<Page<PaymentRecord>, RepositoryError>;
}

impl<R> PaymentRepository for Arc<R>
where
    R: PaymentRepository + ?Sized,
{
    fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        query: &PeriodQuery,
    ) -> Result<Page<PaymentRecord>, RepositoryError> {
        (**self).find_by_tenant(tenant_id, query)
    }
}

/// In-memory transaction source for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTransactionRepository {
    records: RwLock<Vec<TransactionRecord>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TransactionRecord) {
        if let Ok(mut records) = self.records.write() {
            records.push(record);
        }
    }
}

impl TransactionRepository for InMemoryTransactionRepository {
    fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        query: &PeriodQuery,
    ) -> Result<Page<TransactionRecord>, RepositoryError> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::unavailable("transaction store lock poisoned"))?;

        let items: Vec<TransactionRecord> = records
            .iter()
            .filter(|r| r.tenant_id == tenant_id && query.contains(r.occurred_at))
            .cloned()
            .collect();
        let total = items.len();
        Ok(Page { items, total })
    }
}

/// In-memory payment source for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPaymentRepository {
    records: RwLock<Vec<PaymentRecord>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: PaymentRecord) {
        if let Ok(mut records) = self.records.write() {
            records.push(record);
        }
    }
}

impl PaymentRepository for InMemoryPaymentRepository {
    fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        query: &PeriodQuery,
    ) -> Result<Page<PaymentRecord>, RepositoryError> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::unavailable("payment store lock poisoned"))?;

        let items: Vec<PaymentRecord> = records
            .iter()
            .filter(|r| r.tenant_id == tenant_id && query.contains(r.occurred_at))
            .cloned()
            .collect();
        let total = items.len();
        Ok(Page { items, total })
    }
}
