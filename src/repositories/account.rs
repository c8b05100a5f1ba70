use async_trait::async_trait;
use deadpool_postgres::Pool;

use crate::{error::Result, models::account::Account};

/// Lookup and creation of login accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Finds an account by its email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Creates an account. Fails with `Conflict` when the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<Account>;
}

/// Accounts held in the `accounts` table.
#[derive(Clone)]
pub struct AccountRepository {
    pool: Pool,
}

impl AccountRepository {
    /// Creates a new `AccountRepository`.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for AccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT email, password_hash, created_at
                FROM accounts
                WHERE email = $1
                "#,
                &[&email],
            )
            .await?;
        Ok(row.as_ref().map(Account::from))
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<Account> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO accounts (email, password_hash)
                VALUES ($1, $2)
                RETURNING email, password_hash, created_at
                "#,
                &[&email, &password_hash],
            )
            .await?;
        Ok(Account::from(&row))
    }
}
