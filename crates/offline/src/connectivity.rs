//! Per-location connectivity tracking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use tillsync_core::{Clock, LocationId, TenantId};
use tillsync_storage::{JsonStoreExt, KvStore, keys};

use crate::config::OfflineConfig;
use crate::error::OfflineError;

/// Stored connectivity record for one tenant+location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub is_online: bool,
    pub last_update: DateTime<Utc>,
}

/// Answers "is this location online right now?" with a staleness override.
///
/// A stored record only counts as online while it is fresh: anything older
/// than the configured staleness window reads as offline regardless of its
/// flag, so a terminal that stopped reporting drops out of the online set on
/// its own.
#[derive(Clone)]
pub struct ConnectivityTracker<S> {
    store: S,
    clock: Arc<dyn Clock>,
    staleness_window: Duration,
    connection_ttl: Duration,
}

impl<S: KvStore> ConnectivityTracker<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, config: &OfflineConfig) -> Self {
        Self {
            store,
            clock,
            staleness_window: config.staleness_window,
            connection_ttl: config.connection_ttl,
        }
    }

    /// Overwrite the stored status with a fresh timestamp.
    ///
    /// Records are written with a storage TTL so abandoned terminals age out
    /// entirely; the staleness window governs the online decision long before
    /// that.
    pub fn update_status(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        is_online: bool,
    ) -> Result<(), OfflineError> {
        let status = ConnectionStatus {
            is_online,
            last_update: self.clock.now(),
        };

        let key = keys::connection(tenant_id, location_id);
        self.store
            .set_json(&key, &status, Some(self.connection_ttl))?;
        Ok(())
    }

    /// Effective connectivity for a location.
    ///
    /// Fail-safe: missing records, stale records, and storage failures all
    /// read as offline. Connectivity is never assumed on error.
    pub fn is_online(&self, tenant_id: TenantId, location_id: LocationId) -> bool {
        let key = keys::connection(tenant_id, location_id);

        let status: Option<ConnectionStatus> = match self.store.get_json(&key) {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    location_id = %location_id,
                    error = %err,
                    "connectivity lookup failed; treating location as offline"
                );
                return false;
            }
        };

        match status {
            Some(status) => {
                let age = self.clock.now().signed_duration_since(status.last_update);
                let fresh = match age.to_std() {
                    Ok(age) => age <= self.staleness_window,
                    // Future-dated record (clock skew); treat as fresh.
                    Err(_) => true,
                };
                fresh && status.is_online
            }
            None => false,
        }
    }
}
