//! HTTP clients for the notifd subscriber endpoints.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod subscriber;

pub use subscriber::SubscriberClient;

use reqwest::StatusCode;

/// Errors produced by the SDK clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket handshake or framing failure.
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The base URL scheme has no WebSocket counterpart.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(Box::new(value))
    }
}
