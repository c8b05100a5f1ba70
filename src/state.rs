use std::sync::Arc;

use crate::cache::{redis::RedisCache, CacheStore};
use crate::cache_aside::{CacheAside, CachePolicy, Population, StoreDeadlines};
use crate::config::Config;
use crate::error::Result;
use crate::models::{lecturer::Lecturer, library::Library, student::Student};
use crate::repositories::{
    account::{AccountRepository, AccountStore},
    document::DocumentCollection,
    library::{LibraryRepository, LibraryStore},
    student::StudentRepository,
};
use crate::services::token::{JwtClock, SystemClock, TokenService};
use crate::store::DurableStore;
use crate::tasks::BackgroundTasks;

/// The durable backends the service runs on.
pub struct Stores {
    pub students: Arc<dyn DurableStore<Student>>,
    pub lecturers: Arc<dyn DurableStore<Lecturer>>,
    pub libraries: Arc<dyn LibraryStore>,
    pub accounts: Arc<dyn AccountStore>,
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Session token issuer and validator.
    pub tokens: Arc<TokenService>,
    pub students: Arc<CacheAside<Student, dyn DurableStore<Student>>>,
    pub lecturers: Arc<CacheAside<Lecturer, dyn DurableStore<Lecturer>>>,
    pub libraries: Arc<CacheAside<Library, dyn LibraryStore>>,
    /// Login accounts.
    pub accounts: Arc<dyn AccountStore>,
    /// Fire-and-forget work (cache population, audit lines).
    pub tasks: BackgroundTasks,
}

impl AppState {
    /// Creates a new `AppState` backed by PostgreSQL and Redis.
    ///
    /// Creates missing tables on the way.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        crate::db::ensure_schema(&db).await?;
        tracing::info!("✅ PostgreSQL pool initialized");

        let documents = if config.document_database_url == config.database_url {
            db.clone()
        } else {
            let pool = crate::db::create_pool(&config.document_database_url)?;
            crate::db::ensure_schema(&pool).await?;
            pool
        };
        tracing::info!("✅ Document store initialized");

        let cache = RedisCache::connect(&config.redis_url, config.cache_timeout).await?;
        tracing::info!("✅ Redis Connection Manager initialized");

        let stores = Stores {
            students: Arc::new(StudentRepository::new(db.clone())),
            lecturers: Arc::new(DocumentCollection::<Lecturer>::new(documents, "lecturers")),
            libraries: Arc::new(LibraryRepository::new(db.clone())),
            accounts: Arc::new(AccountRepository::new(db)),
        };

        Ok(Self::from_parts(
            config.clone(),
            stores,
            Arc::new(cache),
            Arc::new(SystemClock),
        ))
    }

    /// Wires the state from already-built backends.
    pub fn from_parts(
        config: Config,
        stores: Stores,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn JwtClock>,
    ) -> Self {
        let tasks = BackgroundTasks::new(config.background_task_limit);
        let deadlines = StoreDeadlines {
            read: config.store_read_timeout,
            write: config.store_write_timeout,
        };

        // students churn; lecturers and libraries are looked up by id for longer
        let students = CacheAside::new(
            stores.students,
            cache.clone(),
            tasks.clone(),
            CachePolicy {
                ttl: config.lookup_cache_ttl,
                population: Population::Background,
            },
            deadlines,
        );
        let lecturers = CacheAside::new(
            stores.lecturers,
            cache.clone(),
            tasks.clone(),
            CachePolicy {
                ttl: config.entity_cache_ttl,
                population: Population::Background,
            },
            deadlines,
        );
        let libraries = CacheAside::new(
            stores.libraries,
            cache,
            tasks.clone(),
            CachePolicy {
                ttl: config.entity_cache_ttl,
                population: Population::Inline,
            },
            deadlines,
        );

        Self {
            tokens: Arc::new(TokenService::new(&config.jwt_secret, clock)),
            config,
            students: Arc::new(students),
            lecturers: Arc::new(lecturers),
            libraries: Arc::new(libraries),
            accounts: stores.accounts,
            tasks,
        }
    }
}
