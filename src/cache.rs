//! Volatile key/value cache contract.
//!
//! The cache is never the source of truth: everything in it can be rebuilt
//! from a durable store.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub mod memory;
pub mod redis;

/// Byte-oriented cache with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the bytes stored under `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, overwriting any previous entry.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Removes the entry under `key`.
    async fn del(&self, key: &str) -> Result<()>;
}
