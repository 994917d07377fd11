//! In-memory key/value store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tillsync_core::{Clock, SystemClock};

use crate::kv::{KvStore, StorageError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now < at,
            None => true,
        }
    }
}

/// In-memory store with clock-driven TTL expiry.
///
/// Intended for tests/dev. Expired entries are dropped lazily when the key is
/// next read, so memory is only reclaimed for keys that get touched again.
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose notion of "now" comes from the caller. Tests pair this
    /// with `ManualClock` to exercise expiry deterministically.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = self.clock.now();

        {
            let entries = self
                .entries
                .read()
                .map_err(|_| StorageError::backend("lock poisoned"))?;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {} // expired, evict below
                None => return Ok(None),
            }
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::backend("lock poisoned"))?;
        // Re-check under the write lock; a writer may have replaced the key.
        if let Some(entry) = entries.get(key) {
            if !entry.is_live(now) {
                entries.remove(key);
            }
        }

        Ok(None)
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StorageError> {
        let expires_at = match ttl {
            Some(ttl) => {
                let delta = chrono::Duration::from_std(ttl)
                    .map_err(|e| StorageError::backend(format!("ttl out of range: {e}")))?;
                Some(self.clock.now() + delta)
            }
            None => None,
        };

        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::backend("lock poisoned"))?;
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::backend("lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let now = self.clock.now();
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::backend("lock poisoned"))?;

        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
