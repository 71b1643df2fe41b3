//! Channel senders for the SMS and email channels.
//!
//! The dispatcher depends only on [`ChannelSender`]: deliver `body` to
//! `destination` and report success or failure. The concrete transport
//! is an HTTP gateway that accepts one JSON message per request.

use crate::config::GatewayConfig;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors from a delivery attempt. All of them are treated as transient.
#[derive(Debug, Error)]
pub enum SendError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status
    #[error("gateway rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Deliver `body` to `destination` (phone number, email address, …).
    async fn send(&self, destination: &str, body: &str) -> Result<(), SendError>;
}

/// Request body posted to the gateway.
#[derive(Debug, Serialize)]
struct GatewayMessage<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
    body: &'a str,
}

/// [`ChannelSender`] that posts each message to an HTTP gateway.
pub struct HttpGatewaySender {
    name: &'static str,
    config: GatewayConfig,
    http_client: reqwest::Client,
}

impl HttpGatewaySender {
    /// Create a sender; `name` only labels log lines.
    pub fn new(name: &'static str, config: GatewayConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            name,
            config,
            http_client,
        }
    }
}

#[async_trait]
impl ChannelSender for HttpGatewaySender {
    async fn send(&self, destination: &str, body: &str) -> Result<(), SendError> {
        let message = GatewayMessage {
            from: &self.config.sender,
            to: destination,
            subject: self.config.subject.as_deref(),
            body,
        };

        let mut request = self
            .http_client
            .post(self.config.endpoint.clone())
            .json(&message);

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(gateway = self.name, %status, "Gateway accepted message");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_message_shape() {
        let with_subject = GatewayMessage {
            from: "noreply@example.com",
            to: "a@b.com",
            subject: Some("Notice"),
            body: "hi",
        };
        let value = serde_json::to_value(&with_subject).unwrap();
        assert_eq!(value["subject"], "Notice");
        assert_eq!(value["to"], "a@b.com");

        let sms = GatewayMessage {
            from: "+15550000",
            to: "+15550100",
            subject: None,
            body: "hi",
        };
        let value = serde_json::to_value(&sms).unwrap();
        assert!(value.get("subject").is_none());
    }
}
