//! Analytics Store Client
//!
//! The columnar analytics store speaks the PostgreSQL wire protocol on its
//! own port, so batches are delivered through a second deadpool-postgres
//! pool. Statements and parameters come from [`catalog_events::build_insert`].

use async_trait::async_trait;
use catalog_core::{AnalyticsError, CatalogResult};
use catalog_events::{AnalyticsExecutor, AnalyticsValue, DEFAULT_TABLE};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Analytics store connection configuration.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub host: String,
    /// Postgres-wire port of the analytics store (default: 9005)
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Destination table for change events
    pub table: String,
    pub max_size: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9005,
            dbname: "logs".to_string(),
            user: "default".to_string(),
            password: "".to_string(),
            table: DEFAULT_TABLE.to_string(),
            max_size: 4,
        }
    }
}

impl AnalyticsConfig {
    /// Create AnalyticsConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CATALOG_ANALYTICS_HOST` (default: localhost)
    /// - `CATALOG_ANALYTICS_PORT` (default: 9005)
    /// - `CATALOG_ANALYTICS_NAME` (default: logs)
    /// - `CATALOG_ANALYTICS_USER` (default: default)
    /// - `CATALOG_ANALYTICS_PASSWORD` (default: empty)
    /// - `CATALOG_ANALYTICS_TABLE` (default: items)
    /// - `CATALOG_ANALYTICS_POOL_SIZE` (default: 4)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("CATALOG_ANALYTICS_HOST").unwrap_or(defaults.host),
            port: std::env::var("CATALOG_ANALYTICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("CATALOG_ANALYTICS_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("CATALOG_ANALYTICS_USER").unwrap_or(defaults.user),
            password: std::env::var("CATALOG_ANALYTICS_PASSWORD").unwrap_or(defaults.password),
            table: std::env::var("CATALOG_ANALYTICS_TABLE").unwrap_or(defaults.table),
            max_size: std::env::var("CATALOG_ANALYTICS_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
        }
    }

    /// Create a connection pool for the analytics store.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            ApiError::internal_error(format!("Failed to create analytics pool: {}", e))
        })
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// [`AnalyticsExecutor`] over a Postgres-wire connection pool.
#[derive(Clone)]
pub struct PgAnalyticsExecutor {
    pool: Pool,
}

impl PgAnalyticsExecutor {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &AnalyticsConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }
}

fn as_sql(value: &AnalyticsValue) -> &(dyn ToSql + Sync) {
    match value {
        AnalyticsValue::Int(v) => v,
        AnalyticsValue::Text(v) => v,
        AnalyticsValue::NullableText(v) => v,
        AnalyticsValue::Bool(v) => v,
        AnalyticsValue::Timestamp(v) => v,
    }
}

#[async_trait]
impl AnalyticsExecutor for PgAnalyticsExecutor {
    async fn execute(&self, statement: &str, params: &[AnalyticsValue]) -> CatalogResult<u64> {
        let conn = self.pool.get().await.map_err(|e| AnalyticsError::Unavailable {
            reason: e.to_string(),
        })?;

        let bound: Vec<&(dyn ToSql + Sync)> = params.iter().map(as_sql).collect();
        let written = conn
            .execute(statement, &bound)
            .await
            .map_err(|e| AnalyticsError::ExecuteFailed {
                rows: params.len() / catalog_events::COLUMNS_PER_ROW,
                reason: e.to_string(),
            })?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_wire_port() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.port, 9005);
        assert_eq!(config.dbname, "logs");
        assert_eq!(config.table, "items");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let executor = PgAnalyticsExecutor::from_config(&AnalyticsConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        })
        .expect("pool created");

        let err = executor
            .execute("SELECT 1", &[])
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(
            err,
            catalog_core::CatalogError::Analytics(AnalyticsError::Unavailable { .. })
        ));
    }
}
