//! Offline subsystem configuration.

use std::time::Duration;

/// Tunables for capture, drain, and connectivity decisions.
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// How often the background worker sweeps every known queue.
    pub sync_interval: Duration,
    /// Hard cap per tenant+location queue; the oldest operations are evicted
    /// once the cap is reached. Enqueueing never fails on backlog size.
    pub max_queue_len: usize,
    /// Retry allowance for inventory/customer operations.
    pub default_max_retries: u32,
    /// Retry allowance for transaction operations (financial data gets more
    /// attempts).
    pub transaction_max_retries: u32,
    /// A connectivity record older than this reads as offline regardless of
    /// its stored flag.
    pub staleness_window: Duration,
    /// Storage TTL for connectivity records, so abandoned terminals age out.
    /// Must exceed `staleness_window` to be observable.
    pub connection_ttl: Duration,
    /// Reserved concurrency knob. Drains currently run one operation at a
    /// time per queue; values above 1 have no effect yet.
    pub max_in_flight: usize,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            max_queue_len: 1000,
            default_max_retries: 3,
            transaction_max_retries: 5,
            staleness_window: Duration::from_secs(5 * 60),
            connection_ttl: Duration::from_secs(60 * 60),
            max_in_flight: 1,
        }
    }
}

impl OfflineConfig {
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_max_queue_len(mut self, max: usize) -> Self {
        self.max_queue_len = max;
        self
    }

    pub fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    pub fn with_transaction_max_retries(mut self, retries: u32) -> Self {
        self.transaction_max_retries = retries;
        self
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_connection_ttl(mut self, ttl: Duration) -> Self {
        self.connection_ttl = ttl;
        self
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Retry allowance for an operation touching `entity_type`.
    pub fn max_retries_for(&self, entity_type: &str) -> u32 {
        if entity_type == "transaction" {
            self.transaction_max_retries
        } else {
            self.default_max_retries
        }
    }
}
