//! Redis pub/sub transport.
//!
//! Publishing goes through a shared [`ConnectionManager`]. Each subscription
//! opens a dedicated pub/sub connection whose message stream is forwarded
//! into the subscription queue by a spawned task.

use async_trait::async_trait;
use catalog_core::{BusError, CatalogResult};
use futures_util::{FutureExt, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Message, Subscription};

/// [`EventBus`] backed by Redis `PUBLISH`/`SUBSCRIBE`.
#[derive(Clone)]
pub struct RedisEventBus {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisEventBus {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> CatalogResult<Self> {
        let client = redis::Client::open(url).map_err(|e| BusError::SubscribeFailed {
            subject: "*".to_string(),
            reason: format!("invalid Redis URL: {e}"),
        })?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| BusError::PublishFailed {
                subject: "*".to_string(),
                reason: e.to_string(),
            })?;

        info!("Connected event bus to Redis");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, subject: &str, payload: &str) -> CatalogResult<()> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(subject, payload)
            .await
            .map_err(|e| BusError::PublishFailed {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;
        debug!(subject, receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, subject: &str, capacity: usize) -> CatalogResult<Subscription> {
        let subscribe_failed = |e: redis::RedisError| BusError::SubscribeFailed {
            subject: subject.to_string(),
            reason: e.to_string(),
        };

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(subscribe_failed)?;
        pubsub.subscribe(subject).await.map_err(subscribe_failed)?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let name = subject.to_string();

        let forwarder = tokio::spawn(async move {
            let mut stream = Box::pin(pubsub.into_on_message());
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    next = stream.next() => match next {
                        Some(msg) => {
                            if !forward(&tx, &name, &msg).await {
                                return;
                            }
                        }
                        None => {
                            warn!(subject = %name, "Redis subscription stream ended");
                            return;
                        }
                    }
                }
            }

            // Hand over messages the connection has already buffered.
            while let Some(Some(msg)) = stream.next().now_or_never() {
                if !forward(&tx, &name, &msg).await {
                    return;
                }
            }
        });

        debug!(subject, "Subscribed to Redis channel");
        Ok(Subscription::new(subject, rx, shutdown_tx, forwarder))
    }
}

/// Push one Redis message into the queue. Returns false once the consumer
/// has gone away.
async fn forward(tx: &mpsc::Sender<Message>, subject: &str, msg: &redis::Msg) -> bool {
    match msg.get_payload::<String>() {
        Ok(payload) => tx
            .send(Message {
                subject: subject.to_string(),
                payload,
            })
            .await
            .is_ok(),
        Err(e) => {
            warn!(subject, error = %e, "Dropping non-text Redis message");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::CatalogError;

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let result = RedisEventBus::connect("not a url").await;
        assert!(matches!(
            result,
            Err(CatalogError::Bus(BusError::SubscribeFailed { .. }))
        ));
    }
}
