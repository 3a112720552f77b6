//! Error Types for the Catalog API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use catalog_core::{CatalogError, ConfigError, ItemId, ProjectId, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field format is incorrect
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested item does not exist in the project
    ItemNotFound,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField | ErrorCode::InvalidFormat => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::ItemNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::ItemNotFound => "Item not found",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create an InvalidFormat error.
    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    /// Create an ItemNotFound error.
    pub fn item_not_found(id: ItemId, project_id: ProjectId) -> Self {
        Self::new(
            ErrorCode::ItemNotFound,
            format!("Item {} not found in project {}", id, project_id),
        )
        .with_details(serde_json::json!({ "id": id, "project_id": project_id }))
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a DatabaseError.
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Create a ConnectionPoolExhausted error.
    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling in Axum.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Convert domain errors to ApiError.
impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Store(StoreError::NotFound {
                item_id,
                project_id,
            }) => ApiError::item_not_found(item_id, project_id),
            CatalogError::Store(StoreError::PoolUnavailable { reason }) => {
                tracing::error!(reason = %reason, "Store pool unavailable");
                ApiError::connection_pool_exhausted()
            }
            CatalogError::Store(e) => {
                tracing::error!(error = %e, "Store of record error");
                ApiError::database_error("Database operation failed")
            }
            CatalogError::Cache(e) => {
                tracing::error!(error = %e, "Cache error");
                ApiError::service_unavailable("Cache unavailable")
            }
            CatalogError::Bus(e) => {
                tracing::error!(error = %e, "Event bus error");
                ApiError::service_unavailable("Event bus unavailable")
            }
            CatalogError::Analytics(e) => {
                tracing::error!(error = %e, "Analytics store error");
                ApiError::service_unavailable("Analytics store unavailable")
            }
            CatalogError::Config(e) => ApiError::internal_error(e.to_string()),
        }
    }
}

/// Convert configuration errors raised during startup.
impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        // Log the full error for debugging
        tracing::error!("Database error: {:?}", err);

        // Return a generic database error to avoid leaking internal details
        ApiError::database_error("Database operation failed")
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::CacheError;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ItemNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::DatabaseError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ErrorCode::ConnectionPoolExhausted.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = CatalogError::Store(StoreError::NotFound {
            item_id: 4,
            project_id: 9,
        })
        .into();
        assert_eq!(err.code, ErrorCode::ItemNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message.contains("4"));
        assert_eq!(err.details, Some(serde_json::json!({ "id": 4, "project_id": 9 })));
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let err: ApiError = CatalogError::Store(StoreError::QueryFailed {
            reason: "relation \"items\" does not exist".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("relation"));

        let err: ApiError = CatalogError::Cache(CacheError::Unavailable {
            reason: "refused".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::missing_field("name");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("MISSING_FIELD"));
        assert!(json.contains("name"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
