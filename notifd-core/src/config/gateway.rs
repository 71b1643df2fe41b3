//! HTTP gateway configuration for the SMS and email channels.

use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Endpoint receiving `POST` requests with the message JSON.
    pub endpoint: Url,
    /// Sent as a bearer token when present.
    pub auth_token: Option<String>,
    /// Sender identity (phone number or from-address).
    pub sender: String,
    /// Fixed subject line; only meaningful for email.
    pub subject: Option<String>,
    pub timeout: Duration,
}
