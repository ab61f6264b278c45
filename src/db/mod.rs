use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

pub use operations::*;
pub use query::*;

pub mod operations;
pub mod query;

fn connect_options(config: &DatabaseConfig) -> Result<SqliteConnectOptions> {
    Ok(SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("invalid DATABASE_URL {}", config.url))?
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
        .foreign_keys(true))
}

/// Read-write pool used by ingestion and health checks. Creates the database
/// file if needed.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = connect_options(config)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", config.url))?;

    // Test connection
    health_check(&pool).await?;

    Ok(pool)
}

/// Pool for model-generated analysis queries. Connections are opened
/// read-only, so a bad statement cannot modify the data.
pub fn create_readonly_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = connect_options(config)?.read_only(true);
    Ok(SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_lazy_with(options))
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))
}

pub async fn health_check(pool: &SqlitePool) -> Result<bool> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(true)
}

/// In-memory database with the schema applied, for tests.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let config = crate::config::Config::for_tests("sqlite::memory:").database;
    let pool = create_pool(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
