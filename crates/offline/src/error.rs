//! Error type for queue and drain operations.

use thiserror::Error;
use tillsync_core::{DomainError, LocationId, TenantId};
use tillsync_storage::StorageError;

#[derive(Debug, Error)]
pub enum OfflineError {
    /// No queue exists for the tenant and location (never created, or
    /// already cleared).
    #[error("offline queue not found: tenant {0}, location {1}")]
    QueueNotFound(TenantId, LocationId),
    /// The request was malformed (missing identifiers, empty fields).
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] DomainError),
    /// The backing key/value store failed.
    #[error("offline storage failed: {0}")]
    Storage(#[from] StorageError),
}
