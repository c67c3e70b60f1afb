use crate::categories::repo::{CategoryRepo, PgCategoryRepo};
use crate::config::{AppConfig, StorageBackend};
use crate::memory::MemoryStore;
use crate::transactions::repo::{PgTransactionRepo, TransactionRepo};
use crate::users::repo::{PgUserRepo, UserRepo};
use crate::db;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub categories: Arc<dyn CategoryRepo>,
    pub transactions: Arc<dyn TransactionRepo>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        match config.storage {
            StorageBackend::Postgres => {
                let pool = db::connect(&config).await?;
                Ok(Self {
                    users: Arc::new(PgUserRepo::new(pool.clone())),
                    categories: Arc::new(PgCategoryRepo::new(pool.clone())),
                    transactions: Arc::new(PgTransactionRepo::new(pool)),
                    config,
                })
            }
            StorageBackend::Memory => {
                info!("using in-memory storage; data is lost on restart");
                Ok(Self::with_memory_store(config, MemoryStore::new()))
            }
        }
    }

    pub fn with_memory_store(config: Arc<AppConfig>, store: MemoryStore) -> Self {
        Self {
            config,
            users: Arc::new(store.clone()),
            categories: Arc::new(store.clone()),
            transactions: Arc::new(store),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_store().0
    }

    /// Test state over a fresh in-memory store, handing the store back for
    /// direct inspection.
    #[cfg(test)]
    pub fn fake_with_store() -> (Self, MemoryStore) {
        let config = Arc::new(AppConfig {
            storage: StorageBackend::Memory,
            database_url: None,
            database_max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            pagination: crate::config::PaginationConfig::default(),
        });
        let store = MemoryStore::new();
        (Self::with_memory_store(config, store.clone()), store)
    }
}
