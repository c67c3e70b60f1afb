use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Page size bounds applied by the transaction pagination engine.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Page used when the request does not name one.
    pub default_page: i64,
    /// Page size used when the request does not name one.
    pub default_limit: i64,
    /// Upper bound for the page size; larger requests are clamped.
    pub max_limit: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_limit: 10,
            max_limit: 100,
        }
    }
}

/// Where records are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub pagination: PaginationConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = match std::env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StorageBackend::Postgres,
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "fintrack".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "fintrack-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 30),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24),
        };

        let defaults = PaginationConfig::default();
        let pagination = PaginationConfig {
            default_page: defaults.default_page,
            default_limit: env_or("PAGE_DEFAULT_LIMIT", defaults.default_limit),
            max_limit: env_or("PAGE_MAX_LIMIT", defaults.max_limit).max(1),
        };

        Ok(Self {
            storage,
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            pagination,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
