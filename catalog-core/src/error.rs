//! Error types for catalog operations

use crate::{ItemId, ProjectId};
use thiserror::Error;

/// Key-value cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Failed to decode cache entry {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("Failed to encode cache entry {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Invalid cache key {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Store-of-record errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Item not found: id {item_id} in project {project_id}")]
    NotFound {
        item_id: ItemId,
        project_id: ProjectId,
    },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Connection pool unavailable: {reason}")]
    PoolUnavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Pub/sub errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Publish to {subject} failed: {reason}")]
    PublishFailed { subject: String, reason: String },

    #[error("Subscribe to {subject} failed: {reason}")]
    SubscribeFailed { subject: String, reason: String },

    #[error("Malformed message on {subject}: {reason}")]
    Decode { subject: String, reason: String },
}

/// Analytics store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Analytics insert of {rows} rows failed: {reason}")]
    ExecuteFailed { rows: usize, reason: String },

    #[error("Analytics store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all catalog errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

// =============================================================================
// TESTS
// =============================================================================
