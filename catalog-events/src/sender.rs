//! Batch delivery into the analytics store.
//!
//! A flushed batch becomes a single multi-row `INSERT` with positional
//! parameters, eight per event:
//!
//! ```text
//! INSERT INTO items VALUES ($1, $2, ..., $8), ($9, ..., $16)
//! ```
//!
//! Column order: `id, project_id, name, description, priority, removed,
//! created_at, event_time`.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_core::{AnalyticsEvent, CatalogResult, Timestamp};
use tracing::debug;

/// Default analytics table.
pub const DEFAULT_TABLE: &str = "items";

/// Number of parameters bound per event row.
pub const COLUMNS_PER_ROW: usize = 8;

/// A parameter value bound into an analytics statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsValue {
    Int(i32),
    Text(String),
    NullableText(Option<String>),
    Bool(bool),
    Timestamp(Timestamp),
}

/// Executes parameterized statements against the analytics store.
#[async_trait]
pub trait AnalyticsExecutor: Send + Sync {
    /// Execute `statement` with `params` bound to `$1..$n`. Returns the
    /// number of rows written.
    async fn execute(&self, statement: &str, params: &[AnalyticsValue]) -> CatalogResult<u64>;
}

#[async_trait]
impl<T: AnalyticsExecutor + ?Sized> AnalyticsExecutor for Arc<T> {
    async fn execute(&self, statement: &str, params: &[AnalyticsValue]) -> CatalogResult<u64> {
        (**self).execute(statement, params).await
    }
}

/// Delivers a flushed batch of events.
#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Deliver `batch`. An empty batch is a no-op.
    async fn send(&self, batch: &[AnalyticsEvent]) -> CatalogResult<()>;
}

#[async_trait]
impl<T: BatchSender + ?Sized> BatchSender for Arc<T> {
    async fn send(&self, batch: &[AnalyticsEvent]) -> CatalogResult<()> {
        (**self).send(batch).await
    }
}

/// Build the multi-row insert for `batch`. Returns None for an empty batch.
pub fn build_insert(table: &str, batch: &[AnalyticsEvent]) -> Option<(String, Vec<AnalyticsValue>)> {
    if batch.is_empty() {
        return None;
    }

    let mut sql = format!("INSERT INTO {table} VALUES ");
    let mut params = Vec::with_capacity(batch.len() * COLUMNS_PER_ROW);

    for (row, event) in batch.iter().enumerate() {
        if row > 0 {
            sql.push_str(", ");
        }
        let base = row * COLUMNS_PER_ROW;
        sql.push('(');
        for column in 1..=COLUMNS_PER_ROW {
            if column > 1 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "${}", base + column);
        }
        sql.push(')');

        let item = &event.item;
        params.extend([
            AnalyticsValue::Int(item.id),
            AnalyticsValue::Int(item.project_id),
            AnalyticsValue::Text(item.name.clone()),
            AnalyticsValue::NullableText(item.description.clone().into_option()),
            AnalyticsValue::Int(item.priority),
            AnalyticsValue::Bool(item.removed),
            AnalyticsValue::Timestamp(item.created_at),
            AnalyticsValue::Timestamp(event.event_time),
        ]);
    }

    Some((sql, params))
}

/// [`BatchSender`] writing item change events into an analytics table.
pub struct ItemEventSender<E: AnalyticsExecutor> {
    executor: E,
    table: String,
}

impl<E: AnalyticsExecutor> ItemEventSender<E> {
    pub fn new(executor: E, table: impl Into<String>) -> Self {
        Self {
            executor,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl<E: AnalyticsExecutor> BatchSender for ItemEventSender<E> {
    async fn send(&self, batch: &[AnalyticsEvent]) -> CatalogResult<()> {
        let Some((sql, params)) = build_insert(&self.table, batch) else {
            return Ok(());
        };

        let written = self.executor.execute(&sql, &params).await?;
        debug!(table = %self.table, rows = batch.len(), written, "Sent analytics batch");
        Ok(())
    }
}
