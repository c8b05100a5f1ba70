use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::{config::Host, NoTls};
use crate::error::{AppError, Result};
use std::time::Duration;

/// Tables for relational records, document collections and accounts.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    email TEXT NOT NULL,
    dept TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS libraries (
    library_id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    available_copies INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS books (
    book_id BIGINT PRIMARY KEY,
    book_name TEXT NOT NULL,
    available_copies INTEGER NOT NULL DEFAULT 1 CHECK (available_copies >= 0),
    library_id BIGINT NOT NULL REFERENCES libraries (library_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS authors (
    author_id BIGINT NOT NULL,
    author_name TEXT NOT NULL,
    library_id BIGINT NOT NULL REFERENCES libraries (library_id) ON DELETE CASCADE,
    PRIMARY KEY (library_id, author_id)
);

CREATE TABLE IF NOT EXISTS borrow_records (
    borrow_id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    user_type TEXT NOT NULL CHECK (user_type IN ('student', 'lecturer')),
    book_id BIGINT NOT NULL,
    borrow_date DATE NOT NULL DEFAULT CURRENT_DATE,
    return_date DATE
);

CREATE INDEX IF NOT EXISTS borrow_records_open_idx
    ON borrow_records (user_id, user_type, book_id)
    WHERE return_date IS NULL;

CREATE TABLE IF NOT EXISTS accounts (
    email TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
);
"#;

/// Creates a new database connection pool.
///
/// # Arguments
///
/// * `database_url` - The URL of the PostgreSQL database.
///
/// # Returns
///
/// A `Result` containing the `Pool`.
pub fn create_pool(database_url: &str) -> Result<Pool> {
    let mut cfg = Config::new();
    let pg_config: tokio_postgres::Config = database_url.parse()?;

    if let Some(Host::Tcp(hostname)) = pg_config.get_hosts().first() {
        cfg.host = Some(hostname.to_string());
    }

    if let Some(port) = pg_config.get_ports().first() {
        cfg.port = Some(*port);
    }

    if let Some(dbname) = pg_config.get_dbname() {
        cfg.dbname = Some(dbname.to_string());
    }

    if let Some(user) = pg_config.get_user() {
        cfg.user = Some(user.to_string());
    }

    if let Some(password) = pg_config.get_password() {
        cfg.password = Some(String::from_utf8_lossy(password).to_string());
    }

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    cfg.pool = Some(PoolConfig {
        max_size: 32,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(2)),
            recycle: Some(Duration::from_secs(1)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(AppError::from)
}

/// Creates every table the service needs, if missing.
pub async fn ensure_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("✅ Database schema ready");
    Ok(())
}
