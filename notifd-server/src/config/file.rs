//! TOML file configuration structures.
//!
//! These structs directly map to the `notifd.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub subscribers: SubscribersConfig,
    pub sms: GatewayConfig,
    pub email: GatewayConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Event stream section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_dead_letter_topic")]
    pub dead_letter_topic: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            dead_letter_topic: default_dead_letter_topic(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_topic() -> String {
    "notification_events".to_string()
}

fn default_dead_letter_topic() -> String {
    "notification_events_dlq".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Retry policy and ingest concurrency. Everything except `max_in_flight`
/// is picked up again on SIGHUP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
    #[serde(default = "default_max_backoff_exponent")]
    pub max_backoff_exponent: u32,
    #[serde(default)]
    pub jitter: bool,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_unit_ms: default_backoff_unit_ms(),
            max_backoff_exponent: default_max_backoff_exponent(),
            jitter: false,
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_max_backoff_exponent() -> u32 {
    11
}

fn default_max_in_flight() -> usize {
    256
}

/// Real-time subscriber section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribersConfig {
    /// Messages buffered per connection before pushes are refused.
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for SubscribersConfig {
    fn default() -> Self {
        Self {
            buffer: default_buffer(),
        }
    }
}

fn default_buffer() -> usize {
    32
}

/// HTTP gateway used by the `[sms]` and `[email]` sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub endpoint: Url,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Sender phone number or from-address.
    pub sender: String,
    /// Required for email, ignored for SMS.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[sms]
endpoint = "https://sms.example.com/send"
sender = "+15550000"

[email]
endpoint = "https://mail.example.com/send"
sender = "noreply@example.com"
subject = "You have a new notification"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.stream.topic, "notification_events");
        assert_eq!(config.stream.dead_letter_topic, "notification_events_dlq");
        assert_eq!(config.delivery.max_retries, 3);
        assert_eq!(config.delivery.max_in_flight, 256);
        assert!(!config.delivery.jitter);
        assert_eq!(config.subscribers.buffer, 32);
        assert_eq!(config.sms.timeout_secs, 30);
        assert!(config.sms.subject.is_none());
    }

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[stream]
topic = "events"
dead_letter_topic = "events_dead"
poll_interval_ms = 100

[delivery]
max_retries = 5
backoff_unit_ms = 250
max_backoff_exponent = 6
jitter = true
max_in_flight = 16

[subscribers]
buffer = 8

[sms]
endpoint = "https://sms.example.com/send"
auth_token = "token"
sender = "+15550000"
timeout_secs = 5

[email]
endpoint = "https://mail.example.com/send"
sender = "noreply@example.com"
subject = "Hello"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.stream.poll_interval_ms, 100);
        assert_eq!(config.delivery.backoff_unit_ms, 250);
        assert!(config.delivery.jitter);
        assert_eq!(config.subscribers.buffer, 8);
        assert_eq!(config.sms.auth_token.as_deref(), Some("token"));
        assert_eq!(config.email.subject.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_missing_gateway_is_rejected() {
        let toml_str = r#"
[sms]
endpoint = "https://sms.example.com/send"
sender = "+15550000"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
