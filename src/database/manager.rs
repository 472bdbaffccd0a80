use sqlx::{postgres::PgPoolOptions, PgPool};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::filter::FilterError;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("record not found")]
    NotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("query exceeded its timeout")]
    Timeout,

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Shared handle to the bounded connection pool, built once at startup.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
    query_timeout: Duration,
}

impl Database {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    /// Open the pool with the configured bounds and verify connectivity.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_open_conns)
            .min_connections(config.min_idle_conns.min(config.max_open_conns))
            .idle_timeout(config.max_idle_time)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.dsn)
            .await?;

        let database = Self::new(pool, config.query_timeout);
        database.health_check().await?;

        info!(
            dsn = %redact_dsn(&config.dsn)?,
            max_connections = config.max_open_conns,
            "database connection pool established"
        );
        Ok(database)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Await a store call under the per-call timeout.
    pub async fn run<T, F>(&self, call: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(sqlx::Error::RowNotFound)) => Err(DatabaseError::NotFound),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DatabaseError::Timeout),
        }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        self.run(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("database connection pool closed");
    }
}

/// DSN with the password blanked, for logging.
pub fn redact_dsn(dsn: &str) -> Result<String, DatabaseError> {
    let mut url = url::Url::parse(dsn).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    if url.password().is_some() {
        url.set_password(Some("xxxxx"))
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    }
    Ok(url.into())
}
