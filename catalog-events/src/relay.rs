//! Batched change-event relay.
//!
//! The relay subscribes to the change-event subject and forwards events to
//! a [`BatchSender`] in fixed-size batches. A single worker task owns the
//! buffer, so the append, the threshold check, and the swap to a fresh
//! buffer never race with each other.
//!
//! Delivery is at most once: a batch whose send fails is logged and
//! discarded. A subscription that closes underneath the relay, such as a
//! dropped Redis connection, is re-established with exponential backoff;
//! only [`RelayHandle::stop`] ends the relay.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──event──▶ Buffering ──threshold──▶ Flushing ──▶ Buffering
//!   │                 │
//!   └────stop─────────┴──▶ unsubscribe, drain, flush partial ──▶ Stopped
//! ```
//!
//! # Example
//!
//! ```ignore
//! let relay = BatchRelay::new(bus, sender, RelayConfig::from_env()?);
//! let handle = relay.start().await?;
//!
//! // On shutdown
//! let stats = handle.stop().await;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use catalog_core::{AnalyticsEvent, CatalogResult, ConfigError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::buffer::EventBuffer;
use crate::bus::{EventBus, Message, Subscription};
use crate::publish::{decode_event, DEFAULT_SUBJECT};
use crate::sender::BatchSender;

/// Default flush threshold.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default capacity of the queue between the subscription and the worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// First delay before retrying a failed resubscription.
const RESUBSCRIBE_BACKOFF_MIN: Duration = Duration::from_millis(100);

/// Ceiling for the resubscription delay.
const RESUBSCRIBE_BACKOFF_MAX: Duration = Duration::from_secs(30);

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the batch relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Subject carrying item change events (default: `logs.item`)
    pub subject: String,

    /// Events per flushed batch (default: 10)
    pub batch_size: usize,

    /// Messages queued ahead of the worker before the subscription waits
    /// (default: 1024)
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RelayConfig {
    /// Create RelayConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CATALOG_EVENT_SUBJECT`: Change-event subject (default: logs.item)
    /// - `CATALOG_BATCH_SIZE`: Events per batch, must be positive (default: 10)
    /// - `CATALOG_RELAY_QUEUE_CAPACITY`: Worker queue capacity (default: 1024)
    pub fn from_env() -> Result<Self, ConfigError> {
        let subject =
            std::env::var("CATALOG_EVENT_SUBJECT").unwrap_or_else(|_| DEFAULT_SUBJECT.to_string());

        let batch_size = match std::env::var("CATALOG_BATCH_SIZE") {
            Ok(raw) => parse_positive("CATALOG_BATCH_SIZE", &raw)?,
            Err(_) => DEFAULT_BATCH_SIZE,
        };

        let queue_capacity = std::env::var("CATALOG_RELAY_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);

        let config = Self {
            subject,
            batch_size,
            queue_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subject.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "subject".to_string(),
                value: self.subject.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_positive(field: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "expected a positive integer".to_string(),
        }),
    }
}

// ============================================================================
// STATE AND METRICS
// ============================================================================

/// Observable relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Subscribed, nothing received yet.
    Idle,
    /// Accepting events into the buffer.
    Buffering,
    /// A full batch is being sent.
    Flushing,
    /// Unsubscribed and drained; terminal.
    Stopped,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Buffering => write!(f, "Buffering"),
            Self::Flushing => write!(f, "Flushing"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Counters for relay activity.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Events decoded and buffered
    pub events_received: AtomicU64,

    /// Messages that could not be decoded
    pub decode_errors: AtomicU64,

    /// Batches delivered successfully
    pub batches_sent: AtomicU64,

    /// Events in successfully delivered batches
    pub events_sent: AtomicU64,

    /// Batches discarded after a send failure
    pub batches_failed: AtomicU64,

    /// Events in discarded batches
    pub events_dropped: AtomicU64,

    /// Subscriptions re-established after closing unexpectedly
    pub resubscriptions: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            resubscriptions: self.resubscriptions.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of relay metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySnapshot {
    pub events_received: u64,
    pub decode_errors: u64,
    pub batches_sent: u64,
    pub events_sent: u64,
    pub batches_failed: u64,
    pub events_dropped: u64,
    pub resubscriptions: u64,
}

// ============================================================================
// RELAY
// ============================================================================

/// Subscribes to change events and forwards them in batches.
pub struct BatchRelay<S: BatchSender + 'static> {
    bus: Arc<dyn EventBus>,
    sender: S,
    config: RelayConfig,
}

impl<S: BatchSender + 'static> BatchRelay<S> {
    pub fn new(bus: Arc<dyn EventBus>, sender: S, config: RelayConfig) -> Self {
        Self {
            bus,
            sender,
            config,
        }
    }

    /// Subscribe and spawn the worker task.
    ///
    /// The subscription is established before this returns, so events
    /// published afterwards are guaranteed to reach the relay.
    pub async fn start(self) -> CatalogResult<RelayHandle> {
        self.config.validate()?;
        let subscription = self
            .bus
            .subscribe(&self.config.subject, self.config.queue_capacity)
            .await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(RelayState::Idle);
        let metrics = Arc::new(RelayMetrics::new());

        info!(
            subject = %self.config.subject,
            batch_size = self.config.batch_size,
            queue_capacity = self.config.queue_capacity,
            "Batch relay started"
        );

        let worker = Worker {
            bus: self.bus,
            subject: self.config.subject,
            queue_capacity: self.config.queue_capacity,
            buffer: EventBuffer::new(self.config.batch_size),
            sender: self.sender,
            metrics: Arc::clone(&metrics),
            state: state_tx,
        };
        let task = tokio::spawn(worker.run(subscription, shutdown_rx));

        Ok(RelayHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            metrics,
            task,
        })
    }
}

/// Handle to a running relay.
pub struct RelayHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<RelayState>,
    metrics: Arc<RelayMetrics>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Current counters.
    pub fn metrics(&self) -> RelaySnapshot {
        self.metrics.snapshot()
    }

    /// Unsubscribe, flush whatever is buffered, and wait for the worker.
    pub async fn stop(self) -> RelaySnapshot {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Batch relay worker failed");
        }

        let snapshot = self.metrics.snapshot();
        info!(
            events_received = snapshot.events_received,
            batches_sent = snapshot.batches_sent,
            batches_failed = snapshot.batches_failed,
            events_dropped = snapshot.events_dropped,
            "Batch relay stopped"
        );
        snapshot
    }
}

struct Worker<S: BatchSender> {
    bus: Arc<dyn EventBus>,
    subject: String,
    queue_capacity: usize,
    buffer: EventBuffer,
    sender: S,
    metrics: Arc<RelayMetrics>,
    state: watch::Sender<RelayState>,
}

impl<S: BatchSender> Worker<S> {
    async fn run(mut self, mut subscription: Subscription, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                message = subscription.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => {
                        warn!(subject = %self.subject, "Subscription closed, resubscribing");
                        match self.resubscribe(&mut shutdown_rx).await {
                            Some(fresh) => subscription = fresh,
                            None => break,
                        }
                    }
                }
            }
        }

        subscription.unsubscribe();
        while let Some(message) = subscription.recv().await {
            self.handle(message).await;
        }

        let remaining = self.buffer.take();
        if !remaining.is_empty() {
            debug!(events = remaining.len(), "Flushing partial batch on shutdown");
            self.flush(remaining).await;
        }
        self.state.send_replace(RelayState::Stopped);
    }

    /// Subscribe again, backing off between failures. Returns `None` if
    /// shutdown is requested first.
    async fn resubscribe(&self, shutdown_rx: &mut watch::Receiver<bool>) -> Option<Subscription> {
        let mut delay = RESUBSCRIBE_BACKOFF_MIN;
        loop {
            match self.bus.subscribe(&self.subject, self.queue_capacity).await {
                Ok(subscription) => {
                    self.metrics.resubscriptions.fetch_add(1, Ordering::Relaxed);
                    info!(subject = %self.subject, "Resubscribed to change events");
                    return Some(subscription);
                }
                Err(e) => {
                    warn!(subject = %self.subject, error = %e, retry_in = ?delay, "Resubscribe failed");
                }
            }

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        return None;
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(RESUBSCRIBE_BACKOFF_MAX);
        }
    }

    async fn handle(&mut self, message: Message) {
        let event = match decode_event(&message.subject, &message.payload) {
            Ok(event) => event,
            Err(e) => {
                self.metrics.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Skipping undecodable change event");
                return;
            }
        };

        self.metrics.events_received.fetch_add(1, Ordering::Relaxed);
        self.state.send_replace(RelayState::Buffering);
        if let Some(batch) = self.buffer.push(event) {
            self.flush(batch).await;
        }
    }

    async fn flush(&mut self, batch: Vec<AnalyticsEvent>) {
        self.state.send_replace(RelayState::Flushing);
        let events = batch.len() as u64;

        match self.sender.send(&batch).await {
            Ok(()) => {
                self.metrics.batches_sent.fetch_add(1, Ordering::Relaxed);
                self.metrics.events_sent.fetch_add(events, Ordering::Relaxed);
                debug!(batch_size = events, "Relayed batch");
            }
            Err(e) => {
                self.metrics.batches_failed.fetch_add(1, Ordering::Relaxed);
                self.metrics.events_dropped.fetch_add(events, Ordering::Relaxed);
                error!(batch_size = events, error = %e, "Failed to send batch, discarding");
            }
        }
        self.state.send_replace(RelayState::Buffering);
    }
}
