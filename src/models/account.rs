use chrono::{DateTime, Utc};
use tokio_postgres::Row;

/// A login account.
#[derive(Clone, Debug)]
pub struct Account {
    /// The email the account logs in with.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// The timestamp when the account was created.
    pub created_at: DateTime<Utc>,
}

impl From<&Row> for Account {
    fn from(row: &Row) -> Self {
        Self {
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }
    }
}
