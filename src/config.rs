use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database holding relational records.
    pub database_url: String,
    /// The URL of the PostgreSQL database holding document collections.
    pub document_database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Whether cookies are marked `Secure`.
    pub secure_cookies: bool,
    /// The secret used to sign and verify session tokens.
    pub jwt_secret: Zeroizing<Vec<u8>>,
    /// TTL of cache entries for entities looked up by id.
    pub entity_cache_ttl: Duration,
    /// TTL of cache entries for high-churn lookups.
    pub lookup_cache_ttl: Duration,
    /// Deadline for a single durable-store read.
    pub store_read_timeout: Duration,
    /// Deadline for a single durable-store write.
    pub store_write_timeout: Duration,
    /// Deadline for a single cache call.
    pub cache_timeout: Duration,
    /// How many background tasks may run at once.
    pub background_task_limit: usize,
    /// Account created at startup when it does not exist yet.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Credentials of the account seeded at startup.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: Zeroizing<String>,
}

impl Config {
    /// Creates a `Config` with default settings for everything except the
    /// database and the signing secret.
    pub fn new(database_url: impl Into<String>, jwt_secret: &[u8]) -> Self {
        let database_url = database_url.into();
        Self {
            document_database_url: database_url.clone(),
            database_url,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            secure_cookies: false,
            jwt_secret: Zeroizing::new(jwt_secret.to_vec()),
            entity_cache_ttl: Duration::from_secs(600),
            lookup_cache_ttl: Duration::from_secs(10),
            store_read_timeout: Duration::from_secs(10),
            store_write_timeout: Duration::from_secs(15),
            cache_timeout: Duration::from_millis(500),
            background_task_limit: 256,
            bootstrap_admin: None,
        }
    }

    /// Creates a new `Config` from environment variables.
    ///
    /// Fails when `JWT_SECRET` or `DATABASE_URL` is missing: the process must
    /// not start without a signing secret.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = Zeroizing::new(
            env::var("JWT_SECRET")
                .context("JWT_SECRET must be set (generate with: openssl rand -hex 32)")?,
        );
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let defaults = Self::new(database_url, jwt_secret.as_bytes());

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_EMAIL"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin {
                email,
                password: Zeroizing::new(password),
            }),
            _ => None,
        };

        Ok(Self {
            document_database_url: env::var("DOCUMENT_DATABASE_URL")
                .unwrap_or_else(|_| defaults.database_url.clone()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| defaults.redis_url.clone()),
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr)?,
            secure_cookies: env::var("APP_ENV").is_ok_and(|v| v == "production"),
            entity_cache_ttl: secs_or("ENTITY_CACHE_TTL_SECS", defaults.entity_cache_ttl)?,
            lookup_cache_ttl: secs_or("LOOKUP_CACHE_TTL_SECS", defaults.lookup_cache_ttl)?,
            store_read_timeout: secs_or("STORE_READ_TIMEOUT_SECS", defaults.store_read_timeout)?,
            store_write_timeout: secs_or("STORE_WRITE_TIMEOUT_SECS", defaults.store_write_timeout)?,
            cache_timeout: Duration::from_millis(env_or(
                "CACHE_TIMEOUT_MS",
                defaults.cache_timeout.as_millis() as u64,
            )?),
            background_task_limit: env_or("BACKGROUND_TASK_LIMIT", defaults.background_task_limit)?,
            bootstrap_admin,
            ..defaults
        })
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

fn secs_or(name: &str, default: Duration) -> Result<Duration> {
    env_or(name, default.as_secs()).map(Duration::from_secs)
}
