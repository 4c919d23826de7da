//! Connection pool and schema setup for the Postgres backend.

use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Pool sizing and timeouts, derived from the `database` config section.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

pub async fn create_pool(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .connect(&settings.url)
        .await?;

    tracing::info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Database pool ready"
    );
    Ok(pool)
}

/// Applies the entitlement and saved-report schema.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./src/migrations").run(pool).await
}
