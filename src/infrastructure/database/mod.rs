//! MySQL connector with connection pooling

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::domain::{DomainError, GracefulClose, HealthProbe};

/// Pool bounds
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared MySQL pool. Connections open on first use; call
/// [`Database::authenticate`] to verify the server is reachable.
#[derive(Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("size", &self.pool.size())
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

impl Database {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self::with_settings(config, PoolSettings::default())
    }

    pub fn with_settings(config: &DatabaseConfig, settings: PoolSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password);

        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .idle_timeout(settings.idle_timeout)
            .connect_lazy_with(options);

        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Round-trip query against the server
    pub async fn authenticate(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Unable to connect to database: {}", e)))?;

        Ok(())
    }

    /// Apply pending migrations from `migrations/`
    pub async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to run migrations: {}", e)))?;

        info!("Database migrations applied");
        Ok(())
    }

    /// Waits for checked-out connections to return, then closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl HealthProbe for Database {
    async fn probe(&self) -> Result<(), DomainError> {
        self.authenticate().await
    }
}

#[async_trait]
impl GracefulClose for Database {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn close(&self) -> Result<(), DomainError> {
        Database::close(self).await;
        Ok(())
    }
}
