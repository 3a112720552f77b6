//! REST API Routes
//!
//! All item endpoints live under `/api/v1`. Every request is traced by
//! `tower_http`'s [`TraceLayer`].

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::ItemService;

pub mod items;

pub use items::ItemState;

/// Build the complete API router.
pub fn create_api_router(service: Arc<ItemService>) -> Router {
    Router::new()
        .nest("/api/v1", items::create_router(service))
        .layer(TraceLayer::new_for_http())
}
