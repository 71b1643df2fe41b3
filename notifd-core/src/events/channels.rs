//! In-process event channel factory.
//!
//! Backs `ChannelEventStream` and `ChannelEventPublisher`, which let the
//! dispatcher run embedded without a database-backed stream.

use super::types::RawEvent;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for raw events.
pub type RawEventSender = mpsc::Sender<RawEvent>;
/// Receiver handle for raw events.
pub type RawEventReceiver = mpsc::Receiver<RawEvent>;

/// Create a new raw event channel.
///
/// Multiple senders can be cloned from the returned sender.
pub fn raw_event_channel() -> (RawEventSender, RawEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
