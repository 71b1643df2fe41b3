//! Event types and in-process channel plumbing.
//!
//! # Event Flow
//!
//! 1. An `EventStream` yields `RawEvent`s -> `IngestLoop`
//! 2. `IngestLoop` decodes, persists and spawns one `DeliveryExecutor` run per notification
//! 3. `DeliveryExecutor` records the terminal status and, on failure, hands the
//!    notification to the `DeadLetterForwarder`
//! 4. `DeadLetterForwarder` publishes a `RawEvent` onto the dead-letter topic
//!
//! Events are opaque bytes until the ingest loop decodes them.

pub mod channels;
pub mod types;

pub use channels::{DEFAULT_CHANNEL_BUFFER, RawEventReceiver, RawEventSender, raw_event_channel};
pub use types::RawEvent;
