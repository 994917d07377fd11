//! Redis-backed key/value store.
//!
//! Thin synchronous client mapping the [`KvStore`] contract onto Redis
//! strings: `GET` / `SET` (with `EX` for TTLs) / `DEL`, plus cursor-driven
//! `SCAN MATCH` for prefix listing. One connection per call keeps the store
//! `Sync` without pooling machinery.

use std::sync::Arc;
use std::time::Duration;

use crate::kv::{KvStore, StorageError};

#[derive(Debug, Clone)]
pub struct RedisKvStore {
    client: Arc<redis::Client>,
}

impl RedisKvStore {
    /// Connect lazily to `redis_url` (e.g. "redis://localhost:6379").
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StorageError::backend(format!("redis open failed: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    fn connection(&self) -> Result<redis::Connection, StorageError> {
        self.client
            .get_connection()
            .map_err(|e| StorageError::backend(format!("redis connect failed: {e}")))
    }
}

impl KvStore for RedisKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.connection()?;

        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(|e| StorageError::backend(format!("GET failed: {e}")))?;

        Ok(value)
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StorageError> {
        let mut conn = self.connection()?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            // EX takes whole seconds; sub-second TTLs round up to 1.
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }

        let _: String = cmd
            .query(&mut conn)
            .map_err(|e| StorageError::backend(format!("SET failed: {e}")))?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection()?;

        let _: u64 = redis::cmd("DEL")
            .arg(key)
            .query(&mut conn)
            .map_err(|e| StorageError::backend(format!("DEL failed: {e}")))?;

        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.connection()?;

        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query(&mut conn)
                .map_err(|e| StorageError::backend(format!("SCAN failed: {e}")))?;

            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}
