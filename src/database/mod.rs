//! Postgres persistence for withdrawals and the wallet ledger

pub mod error;

#[cfg(feature = "database")]
pub mod transaction;
#[cfg(feature = "database")]
pub mod wallet_repository;
#[cfg(feature = "database")]
pub mod withdrawal_repository;

#[cfg(feature = "database")]
pub use pool::{health_check, init_pool, PoolConfig};

#[cfg(feature = "database")]
mod pool {
    use super::error::DatabaseError;
    use crate::config::DatabaseConfig;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use std::time::Duration;
    use tracing::{error as log_error, info, warn};

    /// Connection pool sizing and timeouts
    #[derive(Debug, Clone)]
    pub struct PoolConfig {
        pub max_connections: u32,
        pub min_connections: u32,
        pub acquire_timeout: Duration,
        pub idle_timeout: Duration,
    }

    impl Default for PoolConfig {
        fn default() -> Self {
            Self {
                max_connections: 20,
                min_connections: 1,
                acquire_timeout: Duration::from_secs(10),
                idle_timeout: Duration::from_secs(600),
            }
        }
    }

    impl From<&DatabaseConfig> for PoolConfig {
        fn from(config: &DatabaseConfig) -> Self {
            Self {
                max_connections: config.max_connections,
                min_connections: config.max_connections.min(2),
                ..Self::default()
            }
        }
    }

    /// Open the pool; fails fast when the database is unreachable
    pub async fn init_pool(
        database_url: &str,
        config: Option<PoolConfig>,
    ) -> Result<PgPool, DatabaseError> {
        let config = config.unwrap_or_default();

        info!(
            "Connecting to Postgres: max_connections={} acquire_timeout={:?}",
            config.max_connections, config.acquire_timeout
        );

        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(database_url)
            .await
            .map_err(|e| {
                log_error!("Postgres connection failed: {}", e);
                DatabaseError::from_sqlx(e)
            })
    }

    /// Round-trip a trivial query
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(pool)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!("Database health check failed: {}", e);
                DatabaseError::from_sqlx(e)
            })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_pool_config_from_database_config() {
            let config = PoolConfig::from(&DatabaseConfig {
                url: "postgres://localhost/moneymaker".to_string(),
                max_connections: 1,
            });
            assert_eq!(config.max_connections, 1);
            assert_eq!(config.min_connections, 1);
            assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        }
    }
}
