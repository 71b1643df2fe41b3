//! Delivery, ingest and subscriber tuning.

use std::time::Duration;

/// Retry and backoff policy applied by the delivery executor.
///
/// Reloadable: each delivery takes a snapshot when it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Total delivery attempts per notification, including the first.
    pub max_retries: u32,
    /// Length of one backoff time unit; `backoff(k) = 2^k` units.
    pub backoff_unit: Duration,
    /// Exponent cap so a large `max_retries` cannot overflow the delay.
    ///
    /// Once `k` exceeds it every further backoff stays at
    /// `2^max_backoff_exponent` units, so the doubling sequence only holds
    /// while `max_retries <= max_backoff_exponent + 1`. The server config
    /// rejects policies outside that range.
    pub max_backoff_exponent: u32,
    /// Add up to half a unit of random jitter to each backoff.
    pub jitter: bool,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
            max_backoff_exponent: 11,
            jitter: false,
        }
    }
}

/// Ingest loop settings. Not reloadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Upper bound on concurrently running deliveries. The ingest loop stops
    /// pulling from the stream while this many are in flight.
    pub max_in_flight: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { max_in_flight: 256 }
    }
}

/// Subscriber connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberConfig {
    /// Messages buffered per connection before pushes are refused.
    pub buffer: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self { buffer: 32 }
    }
}
