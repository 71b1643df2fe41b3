//! IngestLoop processor.
//!
//! The IngestLoop is responsible for:
//! - Pulling raw events from the `EventStream`, strictly one at a time
//! - Decoding each event into a `pending` notification
//! - Persisting the pending record via the `StatusStore`
//! - Spawning one `DeliveryExecutor` run per persisted notification
//!
//! A semaphore bounds the number of deliveries in flight. While every permit
//! is taken the loop stops pulling from the stream.

use crate::entities::Notification;
use crate::events::RawEvent;
use crate::processors::delivery_executor::{DeliveryExecutor, DeliveryOutcome};
use crate::store::StatusStore;
use crate::stream::EventStream;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tracing::{debug, error, info, warn};

/// Pause after a stream read error before polling again.
const STREAM_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Running counters, shared with the HTTP stats endpoint.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    decode_failures: AtomicU64,
    persist_failures: AtomicU64,
    dispatched: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStatsSnapshot {
    pub received: u64,
    pub decode_failures: u64,
    pub persist_failures: u64,
    pub dispatched: u64,
    pub sent: u64,
    pub failed: u64,
    pub in_flight: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }

    fn record_outcome(&self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Sent { .. } => self.sent.fetch_add(1, Ordering::Relaxed),
            DeliveryOutcome::Failed { .. } => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

pub struct IngestLoop {
    stream: Box<dyn EventStream>,
    store: Arc<dyn StatusStore>,
    executor: Arc<DeliveryExecutor>,
    permits: Arc<Semaphore>,
    max_in_flight: u32,
    stats: Arc<IngestStats>,
    shutdown_rx: watch::Receiver<bool>,
}

impl IngestLoop {
    /// Create a new IngestLoop.
    ///
    /// # Arguments
    ///
    /// * `stream` - Source of raw notification events
    /// * `store` - Status store receiving the pending records
    /// * `executor` - Delivery executor shared by all spawned deliveries
    /// * `max_in_flight` - Upper bound on concurrently running deliveries
    /// * `shutdown_rx` - Receiver for shutdown signal
    pub fn new(
        stream: Box<dyn EventStream>,
        store: Arc<dyn StatusStore>,
        executor: Arc<DeliveryExecutor>,
        max_in_flight: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let max_in_flight = max_in_flight.clamp(1, u32::MAX as usize) as u32;
        Self {
            stream,
            store,
            executor,
            permits: Arc::new(Semaphore::new(max_in_flight as usize)),
            max_in_flight,
            stats: Arc::new(IngestStats::default()),
            shutdown_rx,
        }
    }

    /// Counters for this loop; stays valid after `run` returns.
    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    /// Run until shutdown is signalled or the stream ends, then wait for
    /// every in-flight delivery to finish.
    pub async fn run(mut self) {
        info!(max_in_flight = self.max_in_flight, "IngestLoop started");

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let permit = tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("IngestLoop received shutdown signal");
                        break;
                    }
                    continue;
                }

                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let next = tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        // A claim that already committed is lost with the read.
                        info!(
                            "IngestLoop received shutdown signal, abandoning pending stream read; \
                             an event it had already claimed is dropped"
                        );
                        break;
                    }
                    continue;
                }

                next = self.stream.next_event() => next,
            };

            match next {
                Ok(Some(event)) => self.handle_event(event, permit).await,
                Ok(None) => {
                    info!("Event stream ended");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read from event stream");
                    drop(permit);
                    tokio::time::sleep(STREAM_ERROR_BACKOFF).await;
                }
            }
        }

        self.drain().await;
        info!("IngestLoop shutdown complete");
    }

    async fn handle_event(&self, event: RawEvent, permit: OwnedSemaphorePermit) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let notification = match Notification::decode(&event.payload, OffsetDateTime::now_utc()) {
            Ok(notification) => notification,
            Err(e) => {
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    topic = %event.topic,
                    offset = event.offset,
                    error = %e,
                    "Dropping undecodable event"
                );
                return;
            }
        };

        if let Err(e) = self.store.insert_pending(&notification).await {
            self.stats.persist_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                notification_id = %notification.id,
                error = %e,
                "Failed to persist pending notification, discarding"
            );
            return;
        }

        debug!(
            notification_id = %notification.id,
            channel = %notification.channel,
            "Dispatching notification"
        );
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        self.stats.in_flight.fetch_add(1, Ordering::Relaxed);

        let executor = self.executor.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            let outcome = executor.deliver(notification).await;
            stats.record_outcome(&outcome);
            stats.in_flight.fetch_sub(1, Ordering::Relaxed);
            drop(permit);
        });
    }

    /// Wait until every permit is back, i.e. no delivery is running.
    async fn drain(&self) {
        let in_flight = self.max_in_flight as usize - self.permits.available_permits();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight deliveries");
        }
        if self.permits.acquire_many(self.max_in_flight).await.is_err() {
            warn!("Delivery semaphore closed while draining");
        }
    }
}
