//! Catalog API - REST Layer and Service Bootstrap
//!
//! Exposes the item endpoints over Axum and wires them to the store of
//! record (PostgreSQL), the position cache (Redis) and the change-event
//! relay feeding the analytics store.

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use analytics::{AnalyticsConfig, PgAnalyticsExecutor};
pub use config::{ApiConfig, BusKind, CacheConfig};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use services::ItemService;
pub use types::*;
