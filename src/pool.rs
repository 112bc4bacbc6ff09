use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

use crate::config::Config;
use crate::error::{GatewayError, Result};

/// Build the connection pool for the configured database and verify it with
/// a ping before the gateway starts serving.
pub async fn connect(config: &Config) -> Result<Pool> {
    let pool = create_pool(&config.database_url, config.max_connections, config)?;

    let client = pool.get().await.map_err(|e| GatewayError::ConnectionFailed {
        cause: e.to_string(),
    })?;

    // Simple ping query
    client
        .execute("SELECT 1", &[])
        .await
        .map_err(|e| GatewayError::ConnectionFailed {
            cause: format!("Ping failed: {}", e),
        })?;

    info!("Connected to PostgreSQL");

    Ok(pool)
}

fn create_pool(database_url: &str, max_size: u32, config: &Config) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(config.connect_timeout),
            create: Some(config.connect_timeout),
            recycle: Some(config.connect_timeout),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| GatewayError::Internal(format!("Failed to create pool: {}", e)))
}
