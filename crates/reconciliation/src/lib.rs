//! `tillsync-reconciliation` — end-of-period payment reconciliation.
//!
//! Fetches a tenant's recorded transactions and captured payments for a
//! period, pairs them, grades whatever does not line up, and stores the
//! outcome as a report a manager can review and approve.
//!
//! The moving parts:
//!
//! - [`TransactionRepository`] / [`PaymentRepository`]: read seams onto the
//!   systems of record.
//! - [`ReconciliationEngine`]: fetch, filter, pair, grade, persist.
//! - [`ReconciliationReport`]: the stored verdict, with per-method summaries
//!   and itemized discrepancies.

pub mod engine;
pub mod error;
pub mod record;
pub mod report;

pub use engine::ReconciliationEngine;
pub use error::ReconciliationError;
pub use record::{
    InMemoryPaymentRepository, InMemoryTransactionRepository, Page, PaymentRecord,
    PaymentRepository, PaymentStatus, PeriodQuery, RepositoryError, TransactionRecord,
    TransactionRepository, TransactionStatus,
};
pub use report::{
    CENT_EPSILON, Discrepancy, DiscrepancyKind, HIGH_DIFF_THRESHOLD, MAJOR_VARIANCE_THRESHOLD,
    MethodSummary, ReconciliationOptions, ReconciliationReport, ReconciliationSummary,
    ReportStatus, Severity,
};
