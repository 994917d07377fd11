//! Transient notification emitted when a queued operation syncs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tillsync_core::{LocationId, OperationId, TenantId, UserId};

use crate::change::OperationKind;

/// Fan-out record for one successfully drained operation.
///
/// Produced 1:1 from a queued operation at drain time and handed to the
/// [`SyncBroadcaster`](crate::broadcast::SyncBroadcaster). This subsystem
/// never persists sync events; downstream consumers own any durability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Identity of the operation this event was derived from.
    pub id: OperationId,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub kind: OperationKind,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    /// When the underlying operation was originally captured, not when it
    /// synced.
    pub occurred_at: DateTime<Utc>,
    pub user_id: UserId,
    /// Monotonic marker assigned at drain time; within one engine instance a
    /// later event always carries a larger version.
    pub version: u64,
}
