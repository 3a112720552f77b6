//! Shared wiring for catalog-api integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use catalog_api::{create_api_router, ItemService};
use catalog_events::{EventBus, EventPublisher, InMemoryEventBus};
use catalog_storage::{InMemoryItemStore, InMemoryKeyValueStore, KeyValueStore, PositionCache};
use serde_json::Value;
use tower::ServiceExt;

pub const SUBJECT: &str = "logs.item";

/// An item service over in-memory backends, keeping handles to each one.
pub struct Harness {
    pub store: Arc<InMemoryItemStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub service: Arc<ItemService>,
}

impl Harness {
    pub fn new(store: InMemoryItemStore) -> Self {
        Self::with_kv(store, Arc::new(InMemoryKeyValueStore::new()))
    }

    pub fn with_kv(store: InMemoryItemStore, kv: Arc<dyn KeyValueStore>) -> Self {
        let store = Arc::new(store);
        let bus = Arc::new(InMemoryEventBus::default());
        let bus_dyn: Arc<dyn EventBus> = bus.clone();
        let service = Arc::new(ItemService::new(
            store.clone(),
            Arc::new(PositionCache::new(Arc::clone(&kv))),
            EventPublisher::new(bus_dyn, SUBJECT),
            Duration::from_secs(60),
        ));
        Self {
            store,
            kv,
            bus,
            service,
        }
    }

    pub fn router(&self) -> Router {
        create_api_router(Arc::clone(&self.service))
    }

    /// Send one request through the router and decode the JSON body.
    pub async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self.router().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, json)
    }
}
