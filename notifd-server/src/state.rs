//! Application state shared across all request handlers.

use notifd_core::config::SubscriberConfig;
use notifd_core::framework::DatabaseProcessor;
use notifd_core::processors::IngestStats;
use notifd_core::registry::SubscriberRegistry;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Live real-time connections, shared with the delivery executor.
    pub registry: Arc<SubscriberRegistry>,
    /// Counters of the running ingest loop.
    pub ingest_stats: Arc<IngestStats>,
    pub subscribers: SubscriberConfig,
    /// Used by the readiness check. `None` when running without a database.
    pub db: Option<DatabaseProcessor>,
}

impl AppState {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        ingest_stats: Arc<IngestStats>,
        subscribers: SubscriberConfig,
        db: Option<DatabaseProcessor>,
    ) -> Self {
        Self {
            registry,
            ingest_stats,
            subscribers,
            db,
        }
    }
}
