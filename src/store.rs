//! Durable store contracts.
//!
//! A durable store is the single source of truth for an entity type. Students
//! and libraries live in relational tables, lecturers in a document
//! collection; every adapter exposes the same keyed surface so the cache-aside
//! orchestrator can drive either one.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, Result};

/// A keyed record that can be stored durably and cached.
pub trait Entity:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Prefix separating this entity's cache keys from other entity types.
    const NAMESPACE: &'static str;

    /// The store-assigned key, if one has been assigned.
    fn key(&self) -> Option<String>;

    /// Records the key assigned by the store.
    fn set_key(&mut self, key: &str) -> Result<()>;
}

/// Keyed CRUD over one entity type.
#[async_trait]
pub trait DurableStore<E: Entity>: Send + Sync {
    /// Inserts `entity` and returns the key the store assigned to it.
    async fn insert(&self, entity: &E) -> Result<String>;

    /// Reads the entity stored under `key`.
    async fn fetch(&self, key: &str) -> Result<Option<E>>;

    /// Replaces the entity under `key`. Returns the number of matched records.
    async fn update(&self, key: &str, entity: &E) -> Result<u64>;

    /// Deletes the entity under `key`. Returns the number of deleted records.
    async fn delete(&self, key: &str) -> Result<u64>;
}

/// A store that can create a parent together with its child records as one
/// atomic unit.
#[async_trait]
pub trait AggregateStore<E: Entity>: DurableStore<E> {
    /// Inserts the parent and all children, or nothing.
    async fn insert_with_children(&self, entity: &E) -> Result<String>;
}

/// Runs a store call under `deadline`, failing with `StoreTimeout` instead of
/// hanging on a slow backend.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::StoreTimeout(deadline)),
    }
}

/// Parses a relational key. Keys that are not integers cannot match any row.
pub fn parse_serial_key(key: &str) -> Result<i64> {
    key.parse::<i64>()
        .map_err(|_| AppError::Validation(format!("Invalid id: {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_slow_calls_into_store_timeout() {
        let result: Result<()> = with_deadline(Duration::from_secs(10), async {
            tokio::time::sleep(Duration::from_secs(11)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(AppError::StoreTimeout(d)) if d == Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn deadline_passes_through_results() {
        let value = with_deadline(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(value.ok(), Some(7));
    }

    #[test]
    fn serial_keys_must_be_integers() {
        assert_eq!(parse_serial_key("42").ok(), Some(42));
        assert!(matches!(parse_serial_key("4x2"), Err(AppError::Validation(_))));
    }
}
