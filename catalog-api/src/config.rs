//! API Configuration Module
//!
//! Server binding, pub/sub transport selection and cache settings. Each
//! section is loaded from environment variables with defaults suitable for
//! local development.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use catalog_core::ConfigError;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Pub/sub transport carrying item change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    /// Redis `PUBLISH`/`SUBSCRIBE`.
    Redis,
    /// Process-local broadcast channels.
    Memory,
}

impl FromStr for BusKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "CATALOG_BUS".to_string(),
                value: other.to_string(),
                reason: "expected 'redis' or 'memory'".to_string(),
            }),
        }
    }
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Interface to bind (default: 0.0.0.0)
    pub bind: String,

    /// Listening port (default: 8084)
    pub port: u16,

    /// Change-event transport (default: redis)
    pub bus: BusKind,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8084,
            bus: BusKind::Redis,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CATALOG_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `CATALOG_API_PORT`: Listening port (default: 8084)
    /// - `CATALOG_BUS`: `redis` or `memory` (default: redis)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind = std::env::var("CATALOG_API_BIND").unwrap_or(defaults.bind);

        let port = match std::env::var("CATALOG_API_PORT") {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                field: "CATALOG_API_PORT".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            Err(_) => defaults.port,
        };

        let bus = match std::env::var("CATALOG_BUS") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.bus,
        };

        Ok(Self { bind, port, bus })
    }

    /// Socket address the server listens on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "CATALOG_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Position cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Redis connection URL (default: redis://127.0.0.1:6379)
    pub redis_url: String,

    /// TTL of entries written back after a store read (default: 60 seconds)
    pub ttl: Duration,

    /// Drop every cached entry at startup (default: true)
    pub flush_on_start: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            ttl: Duration::from_secs(60),
            flush_on_start: true,
        }
    }
}

impl CacheConfig {
    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CATALOG_REDIS_URL`: Redis URL (default: redis://127.0.0.1:6379)
    /// - `CATALOG_CACHE_TTL_SECS`: Write-back TTL in seconds (default: 60)
    /// - `CATALOG_CACHE_FLUSH_ON_START`: "true" or "false" (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let redis_url = std::env::var("CATALOG_REDIS_URL").unwrap_or(defaults.redis_url);

        let ttl = std::env::var("CATALOG_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.ttl);

        let flush_on_start = std::env::var("CATALOG_CACHE_FLUSH_ON_START")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.flush_on_start);

        Self {
            redis_url,
            ttl,
            flush_on_start,
        }
    }
}
