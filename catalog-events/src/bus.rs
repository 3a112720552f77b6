//! Publish/subscribe abstraction for change events.
//!
//! A [`Subscription`] is an owned queue fed by a background forwarding task.
//! Unsubscribing only signals the forwarder. It hands over what it had
//! already taken from the transport and exits, and `recv` yields `None` once
//! that tail has been received. The consumer keeps draining while the
//! forwarder winds down, so a full queue never blocks the stop.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use catalog_core::{BusError, CatalogResult};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Capacity of each in-memory subject channel.
const DEFAULT_SUBJECT_CAPACITY: usize = 1024;

/// A message delivered on a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub payload: String,
}

/// Publish/subscribe transport.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish `payload` on `subject`. Publishing with no subscribers
    /// succeeds.
    async fn publish(&self, subject: &str, payload: &str) -> CatalogResult<()>;

    /// Subscribe to `subject`. At most `capacity` messages are queued before
    /// the forwarder waits for the consumer.
    async fn subscribe(&self, subject: &str, capacity: usize) -> CatalogResult<Subscription>;
}

// ============================================================================
// SUBSCRIPTION
// ============================================================================

/// Live subscription to one subject.
pub struct Subscription {
    subject: String,
    receiver: mpsc::Receiver<Message>,
    shutdown: watch::Sender<bool>,
    forwarder: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a queue fed by `forwarder`. The forwarder must stop once
    /// `shutdown` flips to true.
    pub fn new(
        subject: impl Into<String>,
        receiver: mpsc::Receiver<Message>,
        shutdown: watch::Sender<bool>,
        forwarder: JoinHandle<()>,
    ) -> Self {
        Self {
            subject: subject.into(),
            receiver,
            shutdown,
            forwarder: Some(forwarder),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Next message, or `None` once the forwarder has exited and the queue
    /// is drained.
    pub async fn recv(&mut self) -> Option<Message> {
        match self.receiver.recv().await {
            Some(message) => Some(message),
            None => {
                self.reap_forwarder().await;
                None
            }
        }
    }

    /// Ask the forwarder to stop. Messages it already holds are still
    /// delivered; keep calling [`Subscription::recv`] until it yields `None`.
    pub fn unsubscribe(&self) {
        let _ = self.shutdown.send(true);
        debug!(subject = %self.subject, "Unsubscribing");
    }

    async fn reap_forwarder(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            if let Err(e) = forwarder.await {
                warn!(subject = %self.subject, error = %e, "Subscription forwarder panicked");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

// ============================================================================
// IN-MEMORY BUS
// ============================================================================

/// Process-local bus built on tokio broadcast channels, one per subject.
#[derive(Debug)]
pub struct InMemoryEventBus {
    subjects: RwLock<HashMap<String, broadcast::Sender<Message>>>,
    capacity: usize,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECT_CAPACITY)
    }
}

impl InMemoryEventBus {
    /// Create a bus whose subjects buffer up to `capacity` messages per
    /// subscriber before lagging.
    pub fn new(capacity: usize) -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn channel(&self, subject: &str) -> CatalogResult<broadcast::Sender<Message>> {
        if let Some(tx) = self
            .subjects
            .read()
            .map_err(|_| lock_poisoned(subject))?
            .get(subject)
        {
            return Ok(tx.clone());
        }

        let mut subjects = self.subjects.write().map_err(|_| lock_poisoned(subject))?;
        Ok(subjects
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone())
    }
}

fn lock_poisoned(subject: &str) -> BusError {
    BusError::PublishFailed {
        subject: subject.to_string(),
        reason: "subject registry lock poisoned".to_string(),
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, subject: &str, payload: &str) -> CatalogResult<()> {
        let message = Message {
            subject: subject.to_string(),
            payload: payload.to_string(),
        };
        match self.channel(subject)?.send(message) {
            Ok(receivers) => debug!(subject, receivers, "Published message"),
            Err(_) => debug!(subject, "No subscribers for message"),
        }
        Ok(())
    }

    async fn subscribe(&self, subject: &str, capacity: usize) -> CatalogResult<Subscription> {
        let mut source = self.channel(subject)?.subscribe();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let name = subject.to_string();

        let forwarder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    received = source.recv() => match received {
                        Ok(message) => {
                            if tx.send(message).await.is_err() {
                                return;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(subject = %name, skipped, "Subscriber lagged, messages dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }

            // Hand over what was already delivered before the stop, but not
            // what keeps arriving after it.
            for _ in 0..source.len() {
                match source.try_recv() {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                        warn!(subject = %name, skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(_) => break,
                }
            }
        });

        debug!(subject, "Subscribed");
        Ok(Subscription::new(subject, rx, shutdown_tx, forwarder))
    }
}
