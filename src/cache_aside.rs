//! Cache-aside orchestration.
//!
//! Every consistency-sensitive read and write goes through [`CacheAside`]:
//!
//! * reads try the cache, fall through to the durable store on a miss and
//!   repopulate the cache with the store's value;
//! * writes hit the durable store first and only touch the cache after the
//!   store accepted them;
//! * deletes remove the durable record first and then the cache entry.
//!
//! Store errors are returned to the caller untouched. Cache errors never are:
//! on reads they count as a miss, on writes and deletes they are logged and
//! dropped, since the next read miss rebuilds the entry from the store.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::{
    cache::CacheStore,
    error::{AppError, Result},
    store::{with_deadline, AggregateStore, DurableStore, Entity},
    tasks::BackgroundTasks,
};

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Store,
}

impl Origin {
    /// Value of the `x-cache` response header.
    pub fn as_header(&self) -> &'static str {
        match self {
            Origin::Cache => "hit",
            Origin::Store => "miss",
        }
    }
}

/// How cache entries are written after a store read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    /// Awaited before the operation returns.
    Inline,
    /// Dispatched on the background task pool and not awaited.
    Background,
}

/// Cache policy for one entity type.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub population: Population,
}

/// Per-call deadlines for durable store operations.
#[derive(Debug, Clone, Copy)]
pub struct StoreDeadlines {
    pub read: Duration,
    pub write: Duration,
}

impl Default for StoreDeadlines {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            write: Duration::from_secs(15),
        }
    }
}

/// The encoded value returned by [`CacheAside::read`].
#[derive(Debug, Clone)]
pub struct CachedRead {
    /// The JSON encoding of the entity.
    pub bytes: Vec<u8>,
    pub origin: Origin,
}

impl CachedRead {
    /// Decodes the bytes back into the entity.
    pub fn decode<E: Entity>(&self) -> Result<E> {
        Ok(sonic_rs::from_slice(&self.bytes)?)
    }
}

/// Cache-aside orchestrator for the entity type `E` stored in `S`.
///
/// `S` may be unsized so that a `dyn` store can be injected.
pub struct CacheAside<E: Entity, S: ?Sized + DurableStore<E>> {
    store: Arc<S>,
    cache: Arc<dyn CacheStore>,
    tasks: BackgroundTasks,
    policy: CachePolicy,
    deadlines: StoreDeadlines,
    /// Bumped by every eviction. A cache write is dropped when the epoch
    /// moved between the store call it carries and the moment it lands.
    epoch: Arc<RwLock<u64>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> CacheAside<E, S>
where
    E: Entity,
    S: ?Sized + DurableStore<E>,
{
    /// Creates a new `CacheAside`.
    pub fn new(
        store: Arc<S>,
        cache: Arc<dyn CacheStore>,
        tasks: BackgroundTasks,
        policy: CachePolicy,
        deadlines: StoreDeadlines,
    ) -> Self {
        Self {
            store,
            cache,
            tasks,
            policy,
            deadlines,
            epoch: Arc::new(RwLock::new(0)),
            _entity: PhantomData,
        }
    }

    /// The durable store behind this orchestrator.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The cache key for `key`. The identifier is used exactly as given.
    pub fn cache_key(key: &str) -> String {
        format!("{}:{}", E::NAMESPACE, key)
    }

    /// Reads the entity under `key`, from the cache when possible.
    pub async fn read(&self, key: &str) -> Result<CachedRead> {
        let cache_key = Self::cache_key(key);

        match self.cache.get(&cache_key).await {
            Ok(Some(bytes)) => {
                if sonic_rs::from_slice::<E>(&bytes).is_ok() {
                    tracing::debug!("Cache hit: {}", cache_key);
                    return Ok(CachedRead {
                        bytes,
                        origin: Origin::Cache,
                    });
                }
                tracing::warn!("⚠️  Undecodable cache entry {}, reloading from store", cache_key);
            }
            Ok(None) => tracing::debug!("Cache miss: {}", cache_key),
            Err(e) => tracing::warn!("⚠️  Cache read failed for {}, using store: {}", cache_key, e),
        }

        let epoch = self.current_epoch().await;
        let entity = with_deadline(self.deadlines.read, self.store.fetch(key))
            .await?
            .ok_or(AppError::NotFound)?;

        let bytes = sonic_rs::to_vec(&entity)?;
        self.populate(cache_key, bytes.clone(), epoch).await;

        Ok(CachedRead {
            bytes,
            origin: Origin::Store,
        })
    }

    /// Inserts a new entity and caches it under its assigned key.
    pub async fn create(&self, mut entity: E) -> Result<E> {
        let epoch = self.current_epoch().await;
        let key = with_deadline(self.deadlines.write, self.store.insert(&entity)).await?;
        entity.set_key(&key)?;
        self.cache_entity(&key, &entity, epoch).await;
        Ok(entity)
    }

    /// Replaces the entity under `key` and refreshes its cache entry.
    ///
    /// The cache is only touched after the store accepted the write.
    pub async fn write(&self, key: &str, mut entity: E) -> Result<E> {
        entity.set_key(key)?;
        let epoch = self.current_epoch().await;
        let matched = with_deadline(self.deadlines.write, self.store.update(key, &entity)).await?;
        if matched == 0 {
            return Err(AppError::NotFound);
        }
        self.cache_entity(key, &entity, epoch).await;
        Ok(entity)
    }

    /// Deletes the entity under `key` and drops its cache entry.
    ///
    /// When nothing was deleted the cache is left alone and `NotFound` is
    /// returned.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        let deleted = with_deadline(self.deadlines.write, self.store.delete(key)).await?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        self.evict(key).await;
        Ok(())
    }

    /// Drops the cache entry for `key` without touching the store.
    ///
    /// Used after durable mutations that change a cached aggregate without
    /// going through `write`. Cache writes still queued from before the
    /// eviction are dropped.
    pub async fn evict(&self, key: &str) {
        let cache_key = Self::cache_key(key);
        let mut epoch = self.epoch.write().await;
        *epoch += 1;
        if let Err(e) = self.cache.del(&cache_key).await {
            tracing::warn!("⚠️  Cache delete failed for {}: {}", cache_key, e);
        }
    }

    async fn current_epoch(&self) -> u64 {
        *self.epoch.read().await
    }

    async fn cache_entity(&self, key: &str, entity: &E, epoch: u64) {
        match sonic_rs::to_vec(entity) {
            Ok(bytes) => self.populate(Self::cache_key(key), bytes, epoch).await,
            Err(e) => tracing::warn!("⚠️  Could not encode {} for the cache: {}", key, e),
        }
    }

    /// Writes `bytes` unless an eviction happened after `seen` was read.
    async fn populate(&self, cache_key: String, bytes: Vec<u8>, seen: u64) {
        let cache = self.cache.clone();
        let epoch = self.epoch.clone();
        let ttl = self.policy.ttl;
        let write = async move {
            // held across the set so an eviction cannot slip in between
            let current = epoch.read().await;
            if *current != seen {
                tracing::debug!("Dropping stale cache write for {}", cache_key);
                return;
            }
            if let Err(e) = cache.set(&cache_key, &bytes, ttl).await {
                tracing::warn!("⚠️  Cache population failed for {}: {}", cache_key, e);
            }
        };

        match self.policy.population {
            Population::Inline => write.await,
            Population::Background => self.tasks.spawn("cache-populate", write),
        }
    }
}

impl<E, S> CacheAside<E, S>
where
    E: Entity,
    S: ?Sized + AggregateStore<E>,
{
    /// Creates a parent with its children as one atomic store operation.
    ///
    /// Only the parent key is cached, and only after the store committed.
    pub async fn create_aggregate(&self, mut entity: E) -> Result<E> {
        let epoch = self.current_epoch().await;
        let key =
            with_deadline(self.deadlines.write, self.store.insert_with_children(&entity)).await?;
        entity.set_key(&key)?;
        self.cache_entity(&key, &entity, epoch).await;
        Ok(entity)
    }
}
