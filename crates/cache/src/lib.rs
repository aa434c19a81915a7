//! `saaskit-cache` — key-value cache abstraction.
//!
//! The [`Cache`] trait is the seam between callers and the backing store:
//! the in-process [`MemoryCache`] ships here, and multi-process deployments
//! implement the same trait over an external key-value service. Values are
//! opaque byte payloads; [`get_or_load`] layers JSON serialization and the
//! cache-aside/sliding-expiration discipline on top.

pub mod memory;

pub use memory::MemoryCache;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Backing-store failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store itself failed (connection loss, poisoned lock, ...).
    #[error("cache backend: {0}")]
    Backend(String),

    /// A payload could not be encoded or decoded.
    #[error("cache codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Minimal contract a backing store must provide.
///
/// `ttl` of [`Duration::ZERO`] means "never expires".
#[async_trait]
pub trait Cache: Send + Sync {
    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the entry under `key`; `None` on miss or after expiry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Remove the entry under `key` (no-op if absent).
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry whose key starts with `prefix`; returns the count.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    /// Reset the entry's remaining lifetime to `ttl`.
    ///
    /// Returns `false` if the key does not exist (or already expired).
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;
}

#[async_trait]
impl<C> Cache for std::sync::Arc<C>
where
    C: Cache + ?Sized,
{
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        (**self).delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        (**self).delete_prefix(prefix).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        (**self).expire(key, ttl).await
    }
}

/// Cache-aside read with sliding expiration.
///
/// On a hit the entry's expiry is pushed out to `now + ttl`, best effort:
/// an `expire` failure is logged and ignored, the cached value is still
/// returned. On a miss the loader runs and its result is stored with `ttl`
/// before being returned; loader errors propagate and nothing is stored.
/// Concurrent misses for the same key may each run the loader (no
/// single-flight); callers keep loaders idempotent and side-effect free.
pub async fn get_or_load<T, C, F, Fut, E>(
    cache: &C,
    key: &str,
    ttl: Duration,
    loader: F,
) -> Result<T, E>
where
    C: Cache + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<CacheError>,
{
    if let Some(bytes) = cache.get(key).await? {
        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => {
                if let Err(err) = cache.expire(key, ttl).await {
                    tracing::warn!(key, error = %err, "sliding-expiration extend failed");
                }
                return Ok(value);
            }
            Err(err) => {
                // Treat an undecodable payload as a miss and rebuild it.
                tracing::warn!(key, error = %err, "discarding corrupt cache payload");
            }
        }
    }

    let value = loader().await?;
    let bytes = serde_json::to_vec(&value).map_err(CacheError::from)?;
    cache.set(key, bytes, ttl).await?;
    Ok(value)
}
