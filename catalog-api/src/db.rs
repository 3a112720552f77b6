//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and the
//! store-of-record implementation of [`ItemStore`] on top of it.
//!
//! Listings read the aggregate counters and the requested window inside one
//! read-only `REPEATABLE READ` transaction so both observe the same snapshot.

use async_trait::async_trait;
use catalog_core::{
    CatalogError, CatalogResult, Item, ItemId, NullableText, ProjectId, StoreError, Window,
};
use catalog_storage::{ItemStore, WindowRead};
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::{IsolationLevel, NoTls, Row};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Bound on waiting for and creating a connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "catalog".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("CATALOG_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("CATALOG_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("CATALOG_DB_NAME").unwrap_or_else(|_| "catalog".to_string()),
            user: std::env::var("CATALOG_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("CATALOG_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("CATALOG_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("CATALOG_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }

    /// Create a connection pool from this configuration.
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

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Idempotent DDL for the `items` table.
pub const SCHEMA: &str = include_str!("../sql/items.sql");

const ITEM_COLUMNS: &str = "id, project_id, name, description, priority, removed, created_at";

const META_SQL: &str = "SELECT COUNT(*)::BIGINT, COUNT(*) FILTER (WHERE removed)::BIGINT FROM items";

fn list_sql() -> String {
    format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY priority, id LIMIT $1 OFFSET $2")
}

fn returning(sql: &str) -> String {
    format!("{sql} RETURNING {ITEM_COLUMNS}")
}

fn item_from_row(row: &Row) -> Item {
    Item {
        id: row.get("id"),
        project_id: row.get("project_id"),
        name: row.get("name"),
        description: NullableText::from(row.get::<_, Option<String>>("description")),
        priority: row.get("priority"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
    }
}

fn query_failed(err: tokio_postgres::Error) -> CatalogError {
    tracing::error!("Database error: {:?}", err);
    StoreError::QueryFailed {
        reason: err.to_string(),
    }
    .into()
}

fn transaction_failed(err: tokio_postgres::Error) -> CatalogError {
    tracing::error!("Transaction error: {:?}", err);
    StoreError::TransactionFailed {
        reason: err.to_string(),
    }
    .into()
}

fn pool_unavailable(err: PoolError) -> CatalogError {
    tracing::error!("Connection pool error: {:?}", err);
    StoreError::PoolUnavailable {
        reason: err.to_string(),
    }
    .into()
}

fn not_found(id: ItemId, project_id: ProjectId) -> CatalogError {
    StoreError::NotFound {
        item_id: id,
        project_id,
    }
    .into()
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Store-of-record client wrapping a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        let status = self.pool.status();
        status.size
    }

    /// Create the `items` table and its indexes if they are missing.
    pub async fn ensure_schema(&self) -> CatalogResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA).await.map_err(query_failed)?;
        tracing::info!("Store schema ensured");
        Ok(())
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> CatalogResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_unavailable)
    }
}

#[async_trait]
impl ItemStore for DbClient {
    async fn read_window(&self, window: Window) -> CatalogResult<WindowRead> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(transaction_failed)?;

        let meta = tx.query_one(META_SQL, &[]).await.map_err(query_failed)?;
        let rows = tx
            .query(list_sql().as_str(), &[&window.limit.max(0), &window.offset.max(0)])
            .await
            .map_err(query_failed)?;
        tx.commit().await.map_err(transaction_failed)?;

        let read = WindowRead {
            items: rows.iter().map(item_from_row).collect(),
            total: meta.get(0),
            removed: meta.get(1),
        };
        tracing::debug!(
            limit = window.limit,
            offset = window.offset,
            rows = read.items.len(),
            total = read.total,
            "Read item window"
        );
        Ok(read)
    }

    async fn exists(&self, id: ItemId, project_id: ProjectId) -> CatalogResult<bool> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM items WHERE id = $1 AND project_id = $2)",
                &[&id, &project_id],
            )
            .await
            .map_err(query_failed)?;
        Ok(row.get(0))
    }

    async fn create(&self, project_id: ProjectId, name: &str) -> CatalogResult<Item> {
        let conn = self.get_conn().await?;
        let sql = returning(
            "INSERT INTO items (project_id, name, priority) \
             VALUES ($1, $2, (SELECT COALESCE(MAX(priority), 0) + 1 FROM items WHERE project_id = $1))",
        );
        let row = conn
            .query_one(sql.as_str(), &[&project_id, &name])
            .await
            .map_err(query_failed)?;
        Ok(item_from_row(&row))
    }

    async fn update(
        &self,
        id: ItemId,
        project_id: ProjectId,
        name: &str,
        description: NullableText,
    ) -> CatalogResult<Item> {
        let conn = self.get_conn().await?;
        let sql = returning(
            "UPDATE items SET name = $3, description = $4 WHERE id = $1 AND project_id = $2",
        );
        let description = description.into_option();
        conn.query_opt(sql.as_str(), &[&id, &project_id, &name, &description])
            .await
            .map_err(query_failed)?
            .map(|row| item_from_row(&row))
            .ok_or_else(|| not_found(id, project_id))
    }

    async fn remove(&self, id: ItemId, project_id: ProjectId) -> CatalogResult<Item> {
        let conn = self.get_conn().await?;
        let sql = returning("UPDATE items SET removed = TRUE WHERE id = $1 AND project_id = $2");
        conn.query_opt(sql.as_str(), &[&id, &project_id])
            .await
            .map_err(query_failed)?
            .map(|row| item_from_row(&row))
            .ok_or_else(|| not_found(id, project_id))
    }

    async fn reprioritize(
        &self,
        id: ItemId,
        project_id: ProjectId,
        new_priority: i32,
    ) -> CatalogResult<Vec<Item>> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(transaction_failed)?;

        let moved = tx
            .query_opt(
                returning("UPDATE items SET priority = $3 WHERE id = $1 AND project_id = $2")
                    .as_str(),
                &[&id, &project_id, &new_priority],
            )
            .await
            .map_err(query_failed)?
            .ok_or_else(|| not_found(id, project_id))?;

        let shifted = tx
            .query(
                returning(
                    "UPDATE items SET priority = priority + 1 \
                     WHERE project_id = $2 AND id <> $1 AND priority >= $3",
                )
                .as_str(),
                &[&id, &project_id, &new_priority],
            )
            .await
            .map_err(query_failed)?;
        tx.commit().await.map_err(transaction_failed)?;

        let mut affected = Vec::with_capacity(shifted.len() + 1);
        affected.push(item_from_row(&moved));
        affected.extend(shifted.iter().map(item_from_row));
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_queries_select_every_item_column() {
        assert!(list_sql().contains(ITEM_COLUMNS));
        assert!(list_sql().ends_with("ORDER BY priority, id LIMIT $1 OFFSET $2"));
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS items"));
        assert!(returning("DELETE FROM items").ends_with(&format!("RETURNING {ITEM_COLUMNS}")));
    }

    #[tokio::test]
    async fn test_pool_creation_is_lazy() {
        // deadpool connects on first use, so an unreachable host still yields a pool
        let client = DbClient::from_config(&DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..DbConfig::default()
        })
        .expect("pool created");
        assert_eq!(client.pool_size(), 0);
    }
}
