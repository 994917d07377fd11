//! `tillsync-storage` — key/value persistence seam for the offline subsystem.
//!
//! Queue snapshots, connectivity records, drain-attempt markers, and cached
//! reconciliation reports all live behind the [`KvStore`] trait. The
//! in-memory implementation backs tests and single-process deployments; the
//! `redis` feature adds a Redis-backed store for shared deployments.

pub mod keys;
pub mod kv;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use kv::{JsonStoreExt, KvStore, StorageError};
pub use memory::InMemoryKvStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisKvStore;
