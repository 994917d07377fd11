//! Queued operation model and its status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tillsync_core::{DomainError, DomainResult, LocationId, OperationId, TenantId, UserId};
use tillsync_events::OperationKind;

/// Lifecycle of a queued operation.
///
/// Allowed transitions: `pending → syncing → failed`, `failed → pending` (on
/// manual retry reset). Successful syncs remove the operation from the queue
/// instead of storing it as `synced`, so a synced operation can never
/// re-enter the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Captured, waiting for a drain pass.
    Pending,
    /// A drain pass is currently broadcasting this operation.
    Syncing,
    /// Delivered downstream. Terminal.
    Synced,
    /// Last drain attempt failed; retried while attempts remain.
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Syncing => "syncing",
            OperationStatus::Synced => "synced",
            OperationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing request to capture an operation.
///
/// `max_retries = None` resolves to the per-entity-type allowance from
/// [`OfflineConfig`](crate::config::OfflineConfig).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl OperationRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.tenant_id.as_uuid().is_nil() {
            return Err(DomainError::validation("tenant_id is required"));
        }
        if self.location_id.as_uuid().is_nil() {
            return Err(DomainError::validation("location_id is required"));
        }
        if self.user_id.as_uuid().is_nil() {
            return Err(DomainError::validation("user_id is required"));
        }
        if self.entity_type.trim().is_empty() {
            return Err(DomainError::validation("entity_type is required"));
        }
        if self.entity_id.trim().is_empty() {
            return Err(DomainError::validation("entity_id is required"));
        }
        Ok(())
    }
}

/// One captured mutation waiting to sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: OperationStatus,
    /// Reason the most recent drain attempt failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl OfflineOperation {
    /// Build a fresh pending operation from a validated request.
    pub fn from_request(request: OperationRequest, max_retries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: OperationId::new(),
            kind: request.kind,
            tenant_id: request.tenant_id,
            location_id: request.location_id,
            entity_type: request.entity_type,
            entity_id: request.entity_id,
            data: request.data,
            user_id: request.user_id,
            created_at: now,
            retry_count: 0,
            max_retries,
            status: OperationStatus::Pending,
            last_error: None,
        }
    }

    /// Whether an automatic drain pass may pick this operation up.
    ///
    /// Failed operations stay eligible while attempts remain; `syncing`
    /// operations are never re-entered.
    pub fn is_drain_candidate(&self) -> bool {
        match self.status {
            OperationStatus::Pending => true,
            OperationStatus::Failed => self.retry_count < self.max_retries,
            OperationStatus::Syncing | OperationStatus::Synced => false,
        }
    }

    pub fn mark_syncing(&mut self) {
        self.status = OperationStatus::Syncing;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = OperationStatus::Failed;
        self.retry_count += 1;
        self.last_error = Some(error.into());
    }

    /// Manual-retry reset: back to `pending` with a fresh attempt budget.
    pub fn reset_for_retry(&mut self) {
        self.status = OperationStatus::Pending;
        self.retry_count = 0;
        self.last_error = None;
    }
}
