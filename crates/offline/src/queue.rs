//! Tenant+location offline queues: capture, inspect, retry, clear.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tillsync_core::{Clock, LocationId, OperationId, SystemClock, TenantId};
use tillsync_events::{ChangeEvent, SyncBroadcaster};
use tillsync_storage::{JsonStoreExt, KvStore, keys};

use crate::config::OfflineConfig;
use crate::connectivity::ConnectivityTracker;
use crate::error::OfflineError;
use crate::operation::{OfflineOperation, OperationRequest, OperationStatus};
use crate::sync::SyncEngine;

/// Point-in-time view of one queue.
///
/// Reads never fail just because nothing was queued yet: an absent queue
/// yields zero counts and empty timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub total: usize,
    pub pending: usize,
    pub failed: usize,
    /// Newest `created_at` among stored operations.
    pub last_queued_at: Option<DateTime<Utc>>,
    /// When a drain pass last finished for this queue.
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub is_online: bool,
}

/// Outcome of one sweep over every known queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncPassSummary {
    pub queues_visited: usize,
    pub operations_synced: usize,
}

/// Owns the offline queues and composes capture, connectivity, and drain.
///
/// One manager instance serves every tenant+location pair backed by the same
/// store. Queues are stored newest-first under one key per pair and capped;
/// enqueueing never rejects on backlog size.
pub struct OfflineQueueManager<S, B> {
    store: S,
    tracker: ConnectivityTracker<S>,
    engine: SyncEngine<S, B>,
    config: OfflineConfig,
    clock: Arc<dyn Clock>,
}

impl<S, B> OfflineQueueManager<S, B>
where
    S: KvStore + Clone,
    B: SyncBroadcaster,
{
    pub fn new(store: S, broadcaster: B, config: OfflineConfig) -> Self {
        Self::with_clock(store, broadcaster, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: S,
        broadcaster: B,
        config: OfflineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tracker = ConnectivityTracker::new(store.clone(), clock.clone(), &config);
        let engine = SyncEngine::new(store.clone(), tracker.clone(), broadcaster, clock.clone());

        Self {
            store,
            tracker,
            engine,
            config,
            clock,
        }
    }
}

impl<S, B> OfflineQueueManager<S, B>
where
    S: KvStore,
    B: SyncBroadcaster,
{
    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Validate and capture an operation, then opportunistically drain.
    ///
    /// The new operation lands at the head of its queue; anything past the
    /// configured cap falls off the tail (oldest first). The follow-up drain
    /// attempt is best-effort and cannot fail the enqueue itself.
    pub fn queue_operation(&self, request: OperationRequest) -> Result<OperationId, OfflineError> {
        request.validate()?;

        let max_retries = request
            .max_retries
            .unwrap_or_else(|| self.config.max_retries_for(&request.entity_type));
        let op = OfflineOperation::from_request(request, max_retries, self.clock.now());

        let id = op.id;
        let tenant_id = op.tenant_id;
        let location_id = op.location_id;
        let key = keys::queue(tenant_id, location_id);

        let mut queue: Vec<OfflineOperation> = self.store.get_json(&key)?.unwrap_or_default();
        queue.insert(0, op);
        if queue.len() > self.config.max_queue_len {
            let evicted = queue.len() - self.config.max_queue_len;
            queue.truncate(self.config.max_queue_len);
            debug!(
                tenant_id = %tenant_id,
                location_id = %location_id,
                evicted,
                "queue at capacity, evicted oldest operations"
            );
        }
        self.store.set_json(&key, &queue, None)?;

        self.try_drain(tenant_id, location_id);
        Ok(id)
    }

    /// Everything stored for the queue, newest first. Empty when absent.
    pub fn get_queue(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
    ) -> Result<Vec<OfflineOperation>, OfflineError> {
        let key = keys::queue(tenant_id, location_id);
        Ok(self.store.get_json(&key)?.unwrap_or_default())
    }

    pub fn queue_status(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
    ) -> Result<QueueStatus, OfflineError> {
        let queue = self.get_queue(tenant_id, location_id)?;

        let pending = queue
            .iter()
            .filter(|op| op.status == OperationStatus::Pending)
            .count();
        let failed = queue
            .iter()
            .filter(|op| op.status == OperationStatus::Failed)
            .count();
        let last_queued_at = queue.iter().map(|op| op.created_at).max();
        let last_attempt_at = self.engine.last_attempt_at(tenant_id, location_id)?;

        Ok(QueueStatus {
            total: queue.len(),
            pending,
            failed,
            last_queued_at,
            last_attempt_at,
            is_online: self.tracker.is_online(tenant_id, location_id),
        })
    }

    /// Administrative reset: drop the queue and its attempt marker.
    /// Irreversible.
    pub fn clear_queue(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
    ) -> Result<(), OfflineError> {
        self.store.delete(&keys::queue(tenant_id, location_id))?;
        self.store
            .delete(&keys::drain_attempt(tenant_id, location_id))?;

        info!(
            tenant_id = %tenant_id,
            location_id = %location_id,
            "offline queue cleared"
        );
        Ok(())
    }

    /// Reset every failed operation to pending with a fresh attempt budget,
    /// then run one drain pass. Returns how many operations that pass synced,
    /// not how many were reset.
    ///
    /// Retrying a queue that was never created (or already cleared) fails
    /// with [`OfflineError::QueueNotFound`].
    pub fn retry_failed_operations(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
    ) -> Result<usize, OfflineError> {
        let key = keys::queue(tenant_id, location_id);
        let mut queue: Vec<OfflineOperation> = self
            .store
            .get_json(&key)?
            .ok_or(OfflineError::QueueNotFound(tenant_id, location_id))?;

        let mut reset = 0usize;
        for op in &mut queue {
            if op.status == OperationStatus::Failed {
                op.reset_for_retry();
                reset += 1;
            }
        }

        if reset > 0 {
            self.store.set_json(&key, &queue, None)?;
            debug!(
                tenant_id = %tenant_id,
                location_id = %location_id,
                reset,
                "failed operations reset for retry"
            );
        }

        self.engine.attempt_sync(tenant_id, location_id)
    }

    /// Record connectivity and, on an offline→online transition, kick off a
    /// best-effort drain for the location.
    pub fn update_connectivity(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        is_online: bool,
    ) -> Result<(), OfflineError> {
        let was_online = self.tracker.is_online(tenant_id, location_id);
        self.tracker.update_status(tenant_id, location_id, is_online)?;

        if is_online && !was_online {
            self.try_drain(tenant_id, location_id);
        }
        Ok(())
    }

    /// Capture a change notification if its location is offline.
    ///
    /// Online locations sync in real time, so their changes pass through
    /// untouched (`Ok(None)`). Offline changes become queued operations with
    /// the per-entity-type retry allowance.
    pub fn handle_change(&self, event: ChangeEvent) -> Result<Option<OperationId>, OfflineError> {
        if self.tracker.is_online(event.tenant_id, event.location_id) {
            return Ok(None);
        }

        let request = OperationRequest {
            kind: event.kind.operation_kind(),
            tenant_id: event.tenant_id,
            location_id: event.location_id,
            entity_type: event.kind.entity_type().to_string(),
            entity_id: event.entity_id,
            data: event.data,
            user_id: event.user_id,
            max_retries: None,
        };

        self.queue_operation(request).map(Some)
    }

    /// Every tenant+location pair with a stored queue.
    pub fn known_queues(&self) -> Result<Vec<(TenantId, LocationId)>, OfflineError> {
        let queue_keys = self.store.scan_prefix(keys::QUEUE_PREFIX)?;
        Ok(queue_keys
            .iter()
            .filter_map(|key| keys::parse_queue_key(key))
            .collect())
    }

    /// Drain every known queue once; per-queue failures are logged and do
    /// not stop the sweep.
    pub fn sync_all(&self) -> Result<SyncPassSummary, OfflineError> {
        let mut summary = SyncPassSummary::default();

        for (tenant_id, location_id) in self.known_queues()? {
            summary.queues_visited += 1;
            summary.operations_synced += self.try_drain(tenant_id, location_id);
        }

        Ok(summary)
    }

    fn try_drain(&self, tenant_id: TenantId, location_id: LocationId) -> usize {
        match self.engine.attempt_sync(tenant_id, location_id) {
            Ok(synced) => synced,
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    location_id = %location_id,
                    error = %err,
                    "drain attempt failed"
                );
                0
            }
        }
    }
}
