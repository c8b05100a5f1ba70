use std::marker::PhantomData;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::types::Json;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    store::{DurableStore, Entity},
};

/// Length of a generated object id in hex characters.
const OBJECT_ID_LEN: usize = 32;

/// Generates a new object id.
pub fn new_object_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Checks that `key` has the shape of a generated object id.
pub fn validate_object_id(key: &str) -> Result<()> {
    let well_formed = key.len() == OBJECT_ID_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if !well_formed {
        return Err(AppError::Validation(format!("Invalid id format: {}", key)));
    }
    Ok(())
}

/// Document-store adapter: one named, schema-less collection of JSON
/// documents keyed by generated object ids.
pub struct DocumentCollection<E> {
    pool: Pool,
    name: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E> DocumentCollection<E> {
    /// Opens the collection `name`.
    pub fn new(pool: Pool, name: &'static str) -> Self {
        Self {
            pool,
            name,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Entity> DurableStore<E> for DocumentCollection<E> {
    async fn insert(&self, entity: &E) -> Result<String> {
        let id = new_object_id();
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO documents (collection, id, body)
                VALUES ($1, $2, $3)
                "#,
                &[&self.name, &id, &Json(entity)],
            )
            .await?;
        tracing::debug!("Inserted document {}/{}", self.name, id);
        Ok(id)
    }

    async fn fetch(&self, key: &str) -> Result<Option<E>> {
        validate_object_id(key)?;
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT body FROM documents WHERE collection = $1 AND id = $2",
                &[&self.name, &key],
            )
            .await?;

        match row {
            Some(row) => {
                let Json(mut entity): Json<E> = row
                    .try_get("body")
                    .map_err(|e| AppError::Serialization(e.to_string()))?;
                entity.set_key(key)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, key: &str, entity: &E) -> Result<u64> {
        validate_object_id(key)?;
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                r#"
                UPDATE documents
                SET body = $3, updated_at = NOW()
                WHERE collection = $1 AND id = $2
                "#,
                &[&self.name, &key, &Json(entity)],
            )
            .await?;
        Ok(rows)
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        validate_object_id(key)?;
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "DELETE FROM documents WHERE collection = $1 AND id = $2",
                &[&self.name, &key],
            )
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_pass_validation() {
        let id = new_object_id();
        assert_eq!(id.len(), OBJECT_ID_LEN);
        assert!(validate_object_id(&id).is_ok());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        for bad in ["", "abc", "ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ", &"A".repeat(32)] {
            assert!(matches!(validate_object_id(bad), Err(AppError::Validation(_))));
        }
    }
}
