use std::time::Duration;

use ::redis::{aio::ConnectionManager, AsyncCommands};
use async_trait::async_trait;

use crate::cache::CacheStore;
use crate::error::{AppError, Result};

/// Cache adapter backed by a pooled Redis connection.
///
/// Every call runs under a short deadline so a stalled Redis degrades to a
/// cache miss instead of holding the request.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCache {
    /// Connects to `redis_url`.
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> Result<Self> {
        let client = ::redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, op_timeout })
    }

    async fn bounded<T, F>(&self, op: &'static str, call: F) -> Result<T>
    where
        F: std::future::Future<Output = ::redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::CacheUnavailable(format!(
                "Redis {} timed out after {:?}",
                op, self.op_timeout
            ))),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        self.bounded("GET", async move { conn.get::<_, Option<Vec<u8>>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        self.bounded("SETEX", async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded("DEL", async move { conn.del::<_, ()>(key).await })
            .await
    }
}
