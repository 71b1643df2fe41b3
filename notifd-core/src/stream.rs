//! Event stream consumer and publisher.
//!
//! The dispatcher only needs two capabilities from the broker: pull the next
//! event of a topic, and append an event to a topic. Both are traits so the
//! ingest loop and the dead-letter forwarder do not care whether events live
//! in PostgreSQL or in an in-process channel.

use crate::entities::stream_events::{
    AppendStreamEvent, ClaimNextStreamEvent, CountStreamBacklog, StreamEvent,
};
use crate::events::{RawEvent, RawEventReceiver, RawEventSender};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors reading from the event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors appending to the event stream.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event channel closed")]
    Closed,
}

/// Sequential consumer of one topic.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Wait for the next event. `Ok(None)` means the stream has ended and
    /// will never yield again.
    async fn next_event(&mut self) -> Result<Option<RawEvent>, StreamError>;
}

/// Producer onto arbitrary topics.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Append `event` to `event.topic`. Returns the assigned offset.
    async fn publish(&self, event: RawEvent) -> Result<i64, PublishError>;
}

impl From<StreamEvent> for RawEvent {
    fn from(event: StreamEvent) -> Self {
        Self {
            offset: event.id,
            topic: event.topic,
            key: event.message_key,
            payload: event.payload,
        }
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL-backed stream
// ---------------------------------------------------------------------------

/// Consumes a topic of the `stream_events` table.
///
/// Each event is removed as it is claimed, so delivery is at-most-once: an
/// event claimed by a process that then crashes is gone.
pub struct PgEventStream {
    processor: DatabaseProcessor,
    topic: String,
    poll_interval: Duration,
}

impl PgEventStream {
    /// Check the topic and return a consumer for it.
    ///
    /// An error here means the broker is unreachable, which is fatal at
    /// startup.
    pub async fn connect(
        processor: DatabaseProcessor,
        topic: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self, StreamError> {
        let topic = topic.into();
        let backlog = processor
            .process(CountStreamBacklog {
                topic: topic.clone(),
            })
            .await?;
        info!(%topic, backlog, "Event stream reachable");

        Ok(Self {
            processor,
            topic,
            poll_interval,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventStream for PgEventStream {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, StreamError> {
        loop {
            let claimed = self
                .processor
                .process(ClaimNextStreamEvent {
                    topic: self.topic.clone(),
                })
                .await?;

            if let Some(event) = claimed {
                debug!(topic = %self.topic, offset = event.id, "Claimed stream event");
                return Ok(Some(event.into()));
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Appends to the `stream_events` table.
#[derive(Clone)]
pub struct PgEventPublisher {
    processor: DatabaseProcessor,
}

impl PgEventPublisher {
    pub fn new(processor: DatabaseProcessor) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl EventPublisher for PgEventPublisher {
    async fn publish(&self, event: RawEvent) -> Result<i64, PublishError> {
        let id = self
            .processor
            .process(AppendStreamEvent {
                topic: event.topic,
                message_key: event.key,
                payload: event.payload,
            })
            .await?;
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// In-process stream
// ---------------------------------------------------------------------------

/// Consumes events from an in-process channel. Ends once every sender is
/// dropped.
pub struct ChannelEventStream {
    rx: RawEventReceiver,
}

impl ChannelEventStream {
    pub fn new(rx: RawEventReceiver) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl EventStream for ChannelEventStream {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, StreamError> {
        Ok(self.rx.recv().await)
    }
}

/// Publishes into an in-process channel, numbering events from 1.
pub struct ChannelEventPublisher {
    tx: RawEventSender,
    next_offset: AtomicI64,
}

impl ChannelEventPublisher {
    pub fn new(tx: RawEventSender) -> Self {
        Self {
            tx,
            next_offset: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, mut event: RawEvent) -> Result<i64, PublishError> {
        let offset = self.next_offset.fetch_add(1, Ordering::Relaxed);
        event.offset = offset;
        self.tx.send(event).await.map_err(|_| PublishError::Closed)?;
        Ok(offset)
    }
}
