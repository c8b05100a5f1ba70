use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::cache::CacheStore;
use crate::error::{AppError, Result};

/// In-process cache with passive TTL expiry.
///
/// Used when no Redis is wired in, e.g. in tests. It can also be switched
/// offline to simulate an unreachable cache.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, (Vec<u8>, Instant)>>>,
    offline: Arc<std::sync::atomic::AtomicBool>,
}

impl MemoryCache {
    /// Creates a new, empty `MemoryCache`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with `CacheUnavailable` (or succeed
    /// again when `offline` is false).
    pub fn set_offline(&self, offline: bool) {
        self.offline
            .store(offline, std::sync::atomic::Ordering::SeqCst);
    }

    /// Whether a live entry exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .is_some_and(|(_, expires_at)| Instant::now() < *expires_at)
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every entry, as a Redis flush or restart would.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::CacheUnavailable("memory cache offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.check_online()?;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.check_online()?;
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}
