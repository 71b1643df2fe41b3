//! DeadLetterForwarder.
//!
//! Publishes terminally failed notifications, in their stream JSON shape,
//! onto the dead-letter topic keyed by notification id. Publishing is
//! best-effort: a failure is logged and the notification is lost.

use crate::entities::Notification;
use crate::events::RawEvent;
use crate::stream::{EventPublisher, PublishError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum DeadLetterError {
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

#[derive(Clone)]
pub struct DeadLetterForwarder {
    publisher: Arc<dyn EventPublisher>,
    topic: String,
}

impl DeadLetterForwarder {
    pub fn new(publisher: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Forward `notification` to the dead-letter topic, logging any failure.
    ///
    /// Returns whether the publish succeeded.
    pub async fn forward(&self, notification: &Notification) -> bool {
        match self.try_forward(notification).await {
            Ok(offset) => {
                info!(
                    notification_id = %notification.id,
                    topic = %self.topic,
                    offset,
                    "Notification dead-lettered"
                );
                true
            }
            Err(e) => {
                error!(
                    notification_id = %notification.id,
                    topic = %self.topic,
                    error = %e,
                    "Failed to publish dead letter, notification dropped"
                );
                false
            }
        }
    }

    async fn try_forward(&self, notification: &Notification) -> Result<i64, DeadLetterError> {
        let payload = serde_json::to_vec(&notification.to_payload())?;
        let event = RawEvent::new(self.topic.clone(), Some(notification.id.clone()), payload);
        Ok(self.publisher.publish(event).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::raw_event_channel;
    use crate::stream::{ChannelEventPublisher, ChannelEventStream, EventStream};
    use notifd_sdk::objects::{NotificationPayload, NotificationStatus};
    use time::OffsetDateTime;

    fn failed_notification() -> Notification {
        let mut n = Notification::decode(
            br#"{"notificationId":"n1","userId":"u1","channel":"sms","message":"hi"}"#,
            OffsetDateTime::UNIX_EPOCH,
        )
        .unwrap();
        n.transition(crate::entities::NotificationStatus::Failed, OffsetDateTime::UNIX_EPOCH)
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_forward_publishes_keyed_payload() {
        let (tx, rx) = raw_event_channel();
        let forwarder = DeadLetterForwarder::new(Arc::new(ChannelEventPublisher::new(tx)), "dlq");
        let mut stream = ChannelEventStream::new(rx);

        assert!(forwarder.forward(&failed_notification()).await);

        let event = stream.next_event().await.unwrap().unwrap();
        assert_eq!(event.topic, "dlq");
        assert_eq!(event.key.as_deref(), Some("n1"));
        let payload: NotificationPayload = serde_json::from_slice(&event.payload).unwrap();
        assert_eq!(payload.notification_id, "n1");
        assert_eq!(payload.status, Some(NotificationStatus::Failed));
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let (tx, rx) = raw_event_channel();
        drop(rx);
        let forwarder = DeadLetterForwarder::new(Arc::new(ChannelEventPublisher::new(tx)), "dlq");

        assert!(!forwarder.forward(&failed_notification()).await);
    }
}
