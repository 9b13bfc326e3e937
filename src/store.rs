//! In-memory key-value store with lazy TTL expiry
//!
//! Entries carry an optional absolute expiry timestamp. Nothing sweeps the
//! map in the background: an expired entry is dropped the next time a
//! `get` touches it.

use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Current Unix time in milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A value plus its optional absolute expiry (Unix millis)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: String,
    pub expires_at_millis: Option<i64>,
}

impl StoredEntry {
    fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expires_at_millis, Some(at) if now > at)
    }
}

/// Trait defining the interface for key-value storage operations
pub trait Store: Send + Sync {
    /// Overwrite `key`. A positive `ttl_millis` sets a fresh expiry,
    /// anything else clears it.
    async fn set(&self, key: String, value: String, ttl_millis: i64) -> Result<()>;

    /// Get a live value, removing the entry if it has expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Whether `key` has a recorded expiry that has already passed
    async fn is_expired(&self, key: &str) -> Result<bool>;

    /// Number of entries currently held, expired or not
    async fn len(&self) -> Result<usize>;
}

/// Thread-safe in-memory key-value store
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl Store for MemoryStore {
    async fn set(&self, key: String, value: String, ttl_millis: i64) -> Result<()> {
        let expires_at_millis = if ttl_millis > 0 {
            tracing::debug!(key = %key, ttl_millis, "key set with expiry");
            Some(now_millis().saturating_add(ttl_millis))
        } else {
            None
        };

        let mut data = self.data.write().await;
        data.insert(
            key,
            StoredEntry {
                value,
                expires_at_millis,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let data = self.data.read().await;
            match data.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired_at(now_millis()) => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
            }
        }

        // Expired under the read lock: re-check under the write lock since a
        // concurrent SET may have replaced the entry in between.
        let mut data = self.data.write().await;
        let now = now_millis();
        match data.get(key).map(|entry| entry.is_expired_at(now)) {
            Some(true) => {
                data.remove(key);
                tracing::debug!(key = %key, "expired key removed");
                Ok(None)
            }
            Some(false) => Ok(data.get(key).map(|entry| entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn is_expired(&self, key: &str) -> Result<bool> {
        let data = self.data.read().await;
        Ok(data
            .get(key)
            .map(|entry| entry.is_expired_at(now_millis()))
            .unwrap_or(false))
    }

    async fn len(&self) -> Result<usize> {
        let data = self.data.read().await;
        Ok(data.len())
    }
}
