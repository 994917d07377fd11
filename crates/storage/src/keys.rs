//! Key-namespace builders for everything the subsystem persists.
//!
//! Layout:
//! - `offline:queue:{tenant}:{location}`: JSON list of queued operations
//! - `offline:connection:{tenant}:{location}`: connectivity record
//! - `offline:attempt:{tenant}:{location}`: last drain-attempt timestamp
//! - `recon:report:{tenant}:{report_id}`: cached reconciliation report

use tillsync_core::{LocationId, ReconciliationId, TenantId};

pub const QUEUE_PREFIX: &str = "offline:queue:";

pub fn queue(tenant_id: TenantId, location_id: LocationId) -> String {
    format!("{QUEUE_PREFIX}{tenant_id}:{location_id}")
}

pub fn connection(tenant_id: TenantId, location_id: LocationId) -> String {
    format!("offline:connection:{tenant_id}:{location_id}")
}

pub fn drain_attempt(tenant_id: TenantId, location_id: LocationId) -> String {
    format!("offline:attempt:{tenant_id}:{location_id}")
}

pub fn report(tenant_id: TenantId, report_id: ReconciliationId) -> String {
    format!("recon:report:{tenant_id}:{report_id}")
}

/// Prefix covering every cached report for one tenant.
pub fn report_prefix(tenant_id: TenantId) -> String {
    format!("recon:report:{tenant_id}:")
}

/// Recover `(tenant, location)` from a key produced by [`queue`].
///
/// Returns `None` for keys outside the queue namespace or with malformed
/// identifiers; scan-driven callers simply skip those.
pub fn parse_queue_key(key: &str) -> Option<(TenantId, LocationId)> {
    let rest = key.strip_prefix(QUEUE_PREFIX)?;
    let (tenant_raw, location_raw) = rest.split_once(':')?;
    let tenant = tenant_raw.parse().ok()?;
    let location = location_raw.parse().ok()?;
    Some((tenant, location))
}
