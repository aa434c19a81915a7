//! In-process cache backend.
//!
//! A map behind a `RwLock`, with expiry checked lazily on read plus an
//! optional periodic sweep task. Uses `tokio::time::Instant` so tests can
//! drive the clock with `tokio::time::pause`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{Cache, CacheError};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    /// `None` means the entry never expires.
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

fn deadline(ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        Some(Instant::now() + ttl)
    }
}

/// In-memory [`Cache`] for single-process deployments, tests and dev.
#[derive(Debug, Default)]
pub struct MemoryCache {
    items: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every expired entry. The lazy check on `get` makes this
    /// optional; it only bounds memory held by keys nobody reads anymore.
    pub fn purge_expired(&self) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut items = self.items.write().map_err(poisoned)?;
        let before = items.len();
        items.retain(|_, entry| !entry.expired(now));
        Ok((before - items.len()) as u64)
    }

    /// Spawn a background sweep running `purge_expired` at `every`.
    ///
    /// Goes through the same lock as foreground reads and writes, so a sweep
    /// cannot race a concurrent TTL extension into deleting a live entry.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                match cache.purge_expired() {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(purged = n, "cache sweep"),
                    Err(err) => tracing::warn!(error = %err, "cache sweep failed"),
                }
            }
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.items.read().map(|m| m.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> CacheError {
    CacheError::Backend("cache lock poisoned".into())
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: deadline(ttl),
        };
        let mut items = self.items.write().map_err(poisoned)?;
        items.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        {
            let items = self.items.read().map_err(poisoned)?;
            match items.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Lazy eviction: re-check under the write lock, an extend may have
        // revived the entry between the two lock acquisitions.
        let mut items = self.items.write().map_err(poisoned)?;
        if let Some(entry) = items.get(key) {
            if entry.expired(now) {
                items.remove(key);
            } else {
                return Ok(Some(entry.value.clone()));
            }
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut items = self.items.write().map_err(poisoned)?;
        items.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut items = self.items.write().map_err(poisoned)?;
        let before = items.len();
        items.retain(|key, _| !key.starts_with(prefix));
        Ok((before - items.len()) as u64)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut items = self.items.write().map_err(poisoned)?;
        match items.get_mut(key) {
            Some(entry) if !entry.expired(now) => {
                entry.expires_at = deadline(ttl);
                Ok(true)
            }
            Some(_) => {
                items.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
