//! Event stream configuration.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Topic the ingest loop consumes.
    pub topic: String,
    /// Topic terminally failed notifications are published to.
    pub dead_letter_topic: String,
    /// How long the consumer sleeps when its topic is empty.
    pub poll_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            topic: "notification_events".to_string(),
            dead_letter_topic: "notification_events_dlq".to_string(),
            poll_interval: Duration::from_millis(500),
        }
    }
}
