//! Tracing Subscriber Initialization
//!
//! Structured logs go to stdout, as JSON by default or human-readable when
//! `CATALOG_LOG_FORMAT=pretty`. Verbosity follows `RUST_LOG` when set.

use std::str::FromStr;

use catalog_core::ConfigError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str =
    "catalog_api=debug,catalog_storage=info,catalog_events=info,tower_http=debug,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(ConfigError::InvalidValue {
                field: "CATALOG_LOG_FORMAT".to_string(),
                value: other.to_string(),
                reason: "expected 'json' or 'pretty'".to_string(),
            }),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = match std::env::var("CATALOG_LOG_FORMAT") {
            Ok(raw) => raw.parse()?,
            Err(_) => LogFormat::Json,
        };
        Ok(Self { format })
    }
}

/// Install the global tracing subscriber.
///
/// Must be called once, before any other component logs.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(format = ?config.format, "Tracing initialized");
    Ok(())
}
