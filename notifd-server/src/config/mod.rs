//! Configuration module for notifd-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{DeliveryConfig, FileConfig, GatewayConfig as FileGatewayConfig};
use notifd_core::config::{
    DeliveryPolicy, GatewayConfig, IngestConfig, StreamConfig, SubscriberConfig,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Validated configuration converted to runtime types.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub stream: StreamConfig,
    pub delivery: DeliveryPolicy,
    pub ingest: IngestConfig,
    pub subscribers: SubscriberConfig,
    pub sms: GatewayConfig,
    pub email: GatewayConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Convert it to runtime types
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn load_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.delivery.max_retries < 1 {
        return invalid("delivery.max_retries must be at least 1");
    }
    if config.delivery.max_retries > config.delivery.max_backoff_exponent.saturating_add(1) {
        return invalid("delivery.max_retries must not exceed delivery.max_backoff_exponent + 1");
    }
    if config.delivery.max_in_flight < 1 {
        return invalid("delivery.max_in_flight must be at least 1");
    }
    if config.delivery.backoff_unit_ms == 0 {
        return invalid("delivery.backoff_unit_ms must be positive");
    }
    if config.subscribers.buffer < 1 {
        return invalid("subscribers.buffer must be at least 1");
    }
    if config.stream.topic.trim().is_empty() || config.stream.dead_letter_topic.trim().is_empty() {
        return invalid("stream topics must not be empty");
    }
    if config.stream.poll_interval_ms == 0 {
        return invalid("stream.poll_interval_ms must be positive");
    }
    if config.stream.topic == config.stream.dead_letter_topic {
        return invalid("stream.dead_letter_topic must differ from stream.topic");
    }
    if config.email.subject.as_deref().is_none_or(|s| s.trim().is_empty()) {
        return invalid("email.subject is required");
    }
    for (name, gateway) in [("sms", &config.sms), ("email", &config.email)] {
        if gateway.sender.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{name}.sender must not be empty"
            )));
        }
        if gateway.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{name}.timeout_secs must be positive"
            )));
        }
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    LoadedConfig {
        listen: file_config.server.listen,
        stream: StreamConfig {
            topic: file_config.stream.topic,
            dead_letter_topic: file_config.stream.dead_letter_topic,
            poll_interval: Duration::from_millis(file_config.stream.poll_interval_ms),
        },
        delivery: convert_delivery(&file_config.delivery),
        ingest: IngestConfig {
            max_in_flight: file_config.delivery.max_in_flight,
        },
        subscribers: SubscriberConfig {
            buffer: file_config.subscribers.buffer,
        },
        sms: convert_gateway(file_config.sms, false),
        email: convert_gateway(file_config.email, true),
    }
}

fn convert_delivery(d: &DeliveryConfig) -> DeliveryPolicy {
    DeliveryPolicy {
        max_retries: d.max_retries,
        backoff_unit: Duration::from_millis(d.backoff_unit_ms),
        max_backoff_exponent: d.max_backoff_exponent,
        jitter: d.jitter,
    }
}

fn convert_gateway(g: FileGatewayConfig, keep_subject: bool) -> GatewayConfig {
    GatewayConfig {
        endpoint: g.endpoint,
        auth_token: g.auth_token,
        sender: g.sender,
        subject: if keep_subject { g.subject } else { None },
        timeout: Duration::from_secs(g.timeout_secs),
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATEWAYS: &str = r#"
[sms]
endpoint = "https://sms.example.com/send"
sender = "+15550000"
subject = "ignored"

[email]
endpoint = "https://mail.example.com/send"
sender = "noreply@example.com"
subject = "New notification"
"#;

    fn load(extra: &str) -> Result<LoadedConfig, ConfigError> {
        ConfigLoader::new("unused.toml", None).load_str(&format!("{extra}\n{GATEWAYS}"))
    }

    #[test]
    fn test_load_converts_to_runtime_types() {
        let config = load(
            r#"
[delivery]
max_retries = 4
backoff_unit_ms = 200
"#,
        )
        .unwrap();
        assert_eq!(config.delivery.max_retries, 4);
        assert_eq!(config.delivery.backoff_unit, Duration::from_millis(200));
        assert_eq!(config.ingest.max_in_flight, 256);
        assert_eq!(config.stream.poll_interval, Duration::from_millis(500));
        assert!(config.sms.subject.is_none());
        assert_eq!(config.email.subject.as_deref(), Some("New notification"));
        assert_eq!(config.email.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_listen_override() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let config = ConfigLoader::new("unused.toml", Some(addr))
            .load_str(GATEWAYS)
            .unwrap();
        assert_eq!(config.listen, addr);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for extra in [
            "[delivery]\nmax_retries = 0",
            "[delivery]\nmax_in_flight = 0",
            "[delivery]\nbackoff_unit_ms = 0",
            "[subscribers]\nbuffer = 0",
            "[stream]\ntopic = \"\"",
            "[stream]\ntopic = \"same\"\ndead_letter_topic = \"same\"",
            "[stream]\npoll_interval_ms = 0",
            "[delivery]\nmax_retries = 13",
            "[delivery]\nmax_retries = 5\nmax_backoff_exponent = 3",
        ] {
            assert!(
                matches!(load(extra), Err(ConfigError::ValidationError(_))),
                "accepted: {extra}"
            );
        }
    }

    #[test]
    fn test_retry_budget_within_backoff_cap_is_accepted() {
        let config = load("[delivery]\nmax_retries = 12").unwrap();
        assert_eq!(config.delivery.max_retries, 12);
    }

    #[test]
    fn test_zero_gateway_timeout_is_rejected() {
        let toml_str = r#"
[sms]
endpoint = "https://sms.example.com/send"
sender = "+15550000"
timeout_secs = 0

[email]
endpoint = "https://mail.example.com/send"
sender = "noreply@example.com"
subject = "New notification"
"#;
        let result = ConfigLoader::new("unused.toml", None).load_str(toml_str);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_email_subject_is_required() {
        let toml_str = r#"
[sms]
endpoint = "https://sms.example.com/send"
sender = "+15550000"

[email]
endpoint = "https://mail.example.com/send"
sender = "noreply@example.com"
"#;
        let result = ConfigLoader::new("unused.toml", None).load_str(toml_str);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
