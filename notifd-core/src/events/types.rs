//! Event type definitions.

/// An undecoded event as delivered by, or published to, the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Broker-assigned position; 0 for events that have not been stored yet.
    pub offset: i64,
    /// Topic the event was read from or is destined for.
    pub topic: String,
    /// Optional partitioning key (the notification id for dead letters).
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl RawEvent {
    /// Build an event for publishing; the broker assigns the offset.
    pub fn new(topic: impl Into<String>, key: Option<String>, payload: Vec<u8>) -> Self {
        Self {
            offset: 0,
            topic: topic.into(),
            key,
            payload,
        }
    }
}
