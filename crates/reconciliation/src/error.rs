//! Error type for reconciliation runs and report access.

use thiserror::Error;
use tillsync_core::ReconciliationId;
use tillsync_storage::StorageError;

use crate::record::RepositoryError;

#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// No stored report under that id for the tenant.
    #[error("reconciliation report not found: {0}")]
    ReportNotFound(ReconciliationId),
    /// The requested period is inverted.
    #[error("invalid reconciliation period: {0}")]
    InvalidPeriod(String),
    /// A system of record could not be read.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    /// The report cache failed.
    #[error("reconciliation storage failed: {0}")]
    Storage(#[from] StorageError),
}
