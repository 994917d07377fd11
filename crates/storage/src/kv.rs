//! Key/value persistence contract.
//!
//! Values are opaque strings at the trait level; [`JsonStoreExt`] layers
//! typed JSON access on top. Key namespacing is the caller's concern (see
//! [`crate::keys`]).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure inside a [`KvStore`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored value could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StorageError::Backend(msg.into())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Flat string-keyed store with optional per-key TTL.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or overwrite. `ttl = None` stores without expiry; overwriting
    /// always replaces any previous expiry.
    fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StorageError>;

    /// Remove a key. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// All live keys beginning with `prefix`, in unspecified order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

impl<S> KvStore for Arc<S>
where
    S: KvStore + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StorageError> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).scan_prefix(prefix)
    }
}

/// Typed JSON access over any [`KvStore`].
pub trait JsonStoreExt: KvStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw, ttl)
    }
}

impl<S: KvStore + ?Sized> JsonStoreExt for S {}
