//! Change notifications emitted when business records mutate at a location.
//!
//! Point-of-sale flows publish a [`ChangeEvent`] on every inventory,
//! transaction, or customer mutation. The offline subsystem subscribes to
//! these and captures them as queued operations whenever the originating
//! location has no connectivity. Payloads are opaque JSON; capture and replay
//! never inspect their shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tillsync_core::{LocationId, TenantId, UserId};

/// Mutation verb carried by queued operations and sync notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The change notifications the offline subsystem subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    InventoryUpdated,
    TransactionCreated,
    CustomerUpdated,
}

impl ChangeKind {
    /// Dotted event-type name as published by upstream flows.
    pub fn event_type(&self) -> &'static str {
        match self {
            ChangeKind::InventoryUpdated => "inventory.updated",
            ChangeKind::TransactionCreated => "transaction.created",
            ChangeKind::CustomerUpdated => "customer.updated",
        }
    }

    /// Entity namespace the mutated record belongs to.
    pub fn entity_type(&self) -> &'static str {
        match self {
            ChangeKind::InventoryUpdated => "inventory",
            ChangeKind::TransactionCreated => "transaction",
            ChangeKind::CustomerUpdated => "customer",
        }
    }

    /// Mutation verb implied by the change.
    pub fn operation_kind(&self) -> OperationKind {
        match self {
            ChangeKind::TransactionCreated => OperationKind::Create,
            ChangeKind::InventoryUpdated | ChangeKind::CustomerUpdated => OperationKind::Update,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_type())
    }
}

/// A business mutation observed at a tenant location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    /// Upstream identifier of the mutated record (free-form, not necessarily
    /// a UUID).
    pub entity_id: String,
    pub data: serde_json::Value,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        kind: ChangeKind,
        tenant_id: TenantId,
        location_id: LocationId,
        entity_id: impl Into<String>,
        data: serde_json::Value,
        user_id: UserId,
    ) -> Self {
        Self {
            kind,
            tenant_id,
            location_id,
            entity_id: entity_id.into(),
            data,
            user_id,
            occurred_at: Utc::now(),
        }
    }
}
