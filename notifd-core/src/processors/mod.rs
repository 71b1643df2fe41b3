//! Event processors for the dispatch pipeline.
//!
//! - `IngestLoop`: pulls `RawEvent`s, persists them as pending, spawns deliveries
//! - `DeliveryExecutor`: routes, retries and records one notification
//! - `DeadLetterForwarder`: publishes failed notifications to the dead-letter topic

pub mod dead_letter;
pub mod delivery_executor;
pub mod ingest_loop;

pub use dead_letter::{DeadLetterError, DeadLetterForwarder};
pub use delivery_executor::{DeliveryError, DeliveryExecutor, DeliveryOutcome};
pub use ingest_loop::{IngestLoop, IngestStats, IngestStatsSnapshot};
