//! Runtime configuration types for notifd.
//!
//! These types represent the validated runtime configuration consumed by
//! the processors. Loading and parsing is handled by the server crate.

mod config_store;
mod delivery;
mod gateway;
mod stream;

pub use config_store::ConfigStore;
pub use delivery::{DeliveryPolicy, IngestConfig, SubscriberConfig};
pub use gateway::GatewayConfig;
pub use stream::StreamConfig;
