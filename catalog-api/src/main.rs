//! Catalog API Server Entry Point
//!
//! Bootstraps configuration, connects the store of record, the cache and the
//! event bus, starts the event relay and serves the Axum router until ctrl-c.

use std::sync::Arc;

use catalog_api::{
    create_api_router, jobs::start_event_relay, telemetry, AnalyticsConfig, ApiConfig, ApiError,
    ApiResult, BusKind, CacheConfig, DbClient, DbConfig, ItemService, PgAnalyticsExecutor,
};
use catalog_core::CatalogError;
use catalog_events::{EventBus, EventPublisher, InMemoryEventBus, RedisEventBus, RelayConfig};
use catalog_storage::{KeyValueStore, PositionCache, RedisKeyValueStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = telemetry::TelemetryConfig::from_env()?;
    telemetry::init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let cache_config = CacheConfig::from_env();
    let db_config = DbConfig::from_env();
    let analytics_config = AnalyticsConfig::from_env();
    let relay_config = RelayConfig::from_env()?;

    let db = DbClient::from_config(&db_config)?;
    db.ensure_schema().await?;
    let executor = PgAnalyticsExecutor::from_config(&analytics_config)?;

    let kv = RedisKeyValueStore::connect(&cache_config.redis_url)
        .await
        .map_err(CatalogError::from)?;
    kv.ping().await.map_err(CatalogError::from)?;
    tracing::info!("Connected position cache to Redis");
    let kv: Arc<dyn KeyValueStore> = Arc::new(kv);
    let cache = Arc::new(PositionCache::new(kv));
    if cache_config.flush_on_start {
        match cache.clear().await {
            Ok(()) => tracing::info!("Position cache flushed"),
            Err(e) => tracing::warn!(error = %e, "Failed to flush position cache"),
        }
    }

    let bus: Arc<dyn EventBus> = match api_config.bus {
        BusKind::Redis => Arc::new(RedisEventBus::connect(&cache_config.redis_url).await?),
        BusKind::Memory => Arc::new(InMemoryEventBus::default()),
    };

    let relay = start_event_relay(
        Arc::clone(&bus),
        executor,
        &analytics_config.table,
        relay_config.clone(),
    )
    .await?;

    let service = Arc::new(ItemService::new(
        Arc::new(db),
        cache,
        EventPublisher::new(bus, relay_config.subject),
        cache_config.ttl,
    ));
    let app = create_api_router(service);

    let addr = api_config.socket_addr()?;
    tracing::info!(%addr, bus = %api_config.bus, "Starting catalog API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    let served = tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    let totals = relay.stop().await;
    tracing::info!(
        events_sent = totals.events_sent,
        batches_sent = totals.batches_sent,
        batches_failed = totals.batches_failed,
        events_dropped = totals.events_dropped,
        "Event relay stopped"
    );
    served
}
