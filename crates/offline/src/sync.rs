//! Drain logic: push queued operations downstream, one queue at a time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use tillsync_core::{Clock, LocationId, TenantId};
use tillsync_events::{SyncBroadcaster, SyncEvent};
use tillsync_storage::{JsonStoreExt, KvStore, StorageError, keys};

use crate::connectivity::ConnectivityTracker;
use crate::error::OfflineError;
use crate::operation::OfflineOperation;

/// Drains per-location queues through a [`SyncBroadcaster`].
///
/// Drains for different queues may run concurrently; a per-queue guard keeps
/// at most one drain per tenant+location in flight. A caller that finds the
/// queue busy gets `Ok(0)` back without touching anything.
pub struct SyncEngine<S, B> {
    store: S,
    tracker: ConnectivityTracker<S>,
    broadcaster: B,
    clock: Arc<dyn Clock>,
    version: AtomicU64,
    in_flight: Mutex<HashSet<(TenantId, LocationId)>>,
}

impl<S, B> SyncEngine<S, B>
where
    S: KvStore,
    B: SyncBroadcaster,
{
    pub fn new(
        store: S,
        tracker: ConnectivityTracker<S>,
        broadcaster: B,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            tracker,
            broadcaster,
            clock,
            version: AtomicU64::new(0),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Run one drain pass over the queue for `tenant_id` + `location_id`.
    ///
    /// Returns the number of operations removed from the queue. Returns 0
    /// without touching the queue when the location is offline or another
    /// drain already holds it. Candidates are visited in queue order (newest
    /// first); a failed broadcast marks that operation failed and moves on.
    pub fn attempt_sync(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
    ) -> Result<usize, OfflineError> {
        if !self.tracker.is_online(tenant_id, location_id) {
            return Ok(0);
        }

        let _guard = match DrainGuard::acquire(&self.in_flight, tenant_id, location_id) {
            Some(guard) => guard,
            None => {
                debug!(
                    tenant_id = %tenant_id,
                    location_id = %location_id,
                    "queue busy, skipping drain"
                );
                return Ok(0);
            }
        };

        let queue_key = keys::queue(tenant_id, location_id);
        let mut queue: Vec<OfflineOperation> = match self.store.get_json(&queue_key)? {
            Some(queue) => queue,
            // Nothing was ever queued here; leave no attempt marker behind.
            None => return Ok(0),
        };

        let mut synced = 0usize;
        let mut index = 0usize;

        while index < queue.len() {
            if !queue[index].is_drain_candidate() {
                index += 1;
                continue;
            }

            queue[index].mark_syncing();
            self.persist_queue(&queue_key, &queue)?;

            let event = self.to_sync_event(&queue[index]);
            match self.broadcaster.broadcast(&event) {
                Ok(()) => {
                    let op = queue.remove(index);
                    self.persist_queue(&queue_key, &queue)?;
                    synced += 1;
                    debug!(
                        operation_id = %op.id,
                        tenant_id = %tenant_id,
                        location_id = %location_id,
                        entity_type = %op.entity_type,
                        "operation synced"
                    );
                    // The next candidate shifted into this slot.
                }
                Err(err) => {
                    warn!(
                        operation_id = %queue[index].id,
                        tenant_id = %tenant_id,
                        location_id = %location_id,
                        retry_count = queue[index].retry_count + 1,
                        error = %err,
                        "operation sync failed"
                    );
                    queue[index].mark_failed(err.to_string());
                    self.persist_queue(&queue_key, &queue)?;
                    index += 1;
                }
            }
        }

        self.record_attempt(tenant_id, location_id)?;
        Ok(synced)
    }

    /// When this engine last finished a drain pass for the queue.
    pub fn last_attempt_at(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, OfflineError> {
        let key = keys::drain_attempt(tenant_id, location_id);
        Ok(self.store.get_json(&key)?)
    }

    fn persist_queue(&self, key: &str, queue: &[OfflineOperation]) -> Result<(), StorageError> {
        if queue.is_empty() {
            // Fully drained queues disappear instead of lingering as `[]`.
            self.store.delete(key)
        } else {
            self.store.set_json(key, &queue, None)
        }
    }

    fn record_attempt(&self, tenant_id: TenantId, location_id: LocationId) -> Result<(), StorageError> {
        let key = keys::drain_attempt(tenant_id, location_id);
        self.store.set_json(&key, &self.clock.now(), None)
    }

    fn to_sync_event(&self, op: &OfflineOperation) -> SyncEvent {
        SyncEvent {
            id: op.id,
            tenant_id: op.tenant_id,
            location_id: op.location_id,
            kind: op.kind,
            entity_type: op.entity_type.clone(),
            entity_id: op.entity_id.clone(),
            data: op.data.clone(),
            occurred_at: op.created_at,
            user_id: op.user_id,
            version: self.next_version(),
        }
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// RAII slot in the in-flight set; released on drop even if a pass errors.
struct DrainGuard<'a> {
    slots: &'a Mutex<HashSet<(TenantId, LocationId)>>,
    key: (TenantId, LocationId),
}

impl<'a> DrainGuard<'a> {
    fn acquire(
        slots: &'a Mutex<HashSet<(TenantId, LocationId)>>,
        tenant_id: TenantId,
        location_id: LocationId,
    ) -> Option<Self> {
        let key = (tenant_id, location_id);
        // A poisoned lock reads as "busy"; drains stop rather than overlap.
        let mut held = slots.lock().ok()?;
        if held.insert(key) {
            Some(Self { slots, key })
        } else {
            None
        }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.slots.lock() {
            held.remove(&self.key);
        }
    }
}
