use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::config::AppConfig;

/// Open the PostgreSQL pool and bring the schema up to date.
pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not configured")?;

    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;
    info!("database migrations applied");

    Ok(db)
}

/// A unique constraint rejected a write. Raised by the in-memory store, which
/// has no database error to wrap.
#[derive(Debug, thiserror::Error)]
#[error("duplicate key value violates unique constraint \"{0}\"")]
pub struct UniqueViolation(pub &'static str);

/// Whether `err` wraps a unique constraint violation, either PostgreSQL's
/// 23505 or a [`UniqueViolation`].
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<UniqueViolation>()
            || cause
                .downcast_ref::<sqlx::Error>()
                .and_then(|e| e.as_database_error())
                .and_then(|e| e.code())
                .is_some_and(|code| code == "23505")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("duplicate key")));
        let wrapped = anyhow::Error::new(sqlx::Error::RowNotFound).context("insert user");
        assert!(!is_unique_violation(&wrapped));
    }

    #[test]
    fn typed_violation_is_detected_through_context() {
        let err = anyhow::Error::new(UniqueViolation("users_email_key")).context("create user");
        assert!(is_unique_violation(&err));
    }
}
