//! Subscriber client (recipient device → notifd server).
//!
//! Both endpoints identify the recipient through the `userId` query
//! argument and yield each pushed message body as one stream item.

use std::collections::VecDeque;

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::ClientError;
use crate::objects::SseDecoder;

/// Query argument carrying the recipient identity.
pub const RECIPIENT_QUERY_PARAM: &str = "userId";

#[derive(Debug, Clone)]
pub struct SubscriberClient {
    http: Client,
    base_url: Url,
}

impl SubscriberClient {
    /// Create a new `SubscriberClient` rooted at the server's base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    fn endpoint(&self, path: &str, user_id: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut()
            .append_pair(RECIPIENT_QUERY_PARAM, user_id);
        Ok(url)
    }

    /// `GET /sse?userId=...` – follow the Server-Sent Events stream.
    ///
    /// The stream ends when the server closes the connection, which also
    /// happens when another connection registers for the same recipient.
    pub async fn subscribe_sse(
        &self,
        user_id: &str,
    ) -> Result<impl Stream<Item = Result<String, ClientError>> + Send + 'static, ClientError>
    {
        let url = self.endpoint("/sse", user_id)?;
        let resp = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }

        let chunks = Box::pin(resp.bytes_stream());
        let state = (chunks, SseDecoder::new(), VecDeque::new());

        Ok(futures_util::stream::unfold(
            state,
            |(mut chunks, mut decoder, mut ready)| async move {
                loop {
                    if let Some(event) = ready.pop_front() {
                        return Some((Ok(event), (chunks, decoder, ready)));
                    }
                    match chunks.next().await {
                        Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                        Some(Err(e)) => {
                            return Some((Err(ClientError::Http(e)), (chunks, decoder, ready)));
                        }
                        None => return None,
                    }
                }
            },
        ))
    }

    /// `GET /ws?userId=...` – follow the WebSocket variant.
    ///
    /// Only text frames carry messages; control frames are skipped.
    pub async fn subscribe_ws(
        &self,
        user_id: &str,
    ) -> Result<impl Stream<Item = Result<String, ClientError>> + Send + 'static, ClientError>
    {
        let mut url = self.endpoint("/ws", user_id)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ClientError::UnsupportedScheme(other.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::UnsupportedScheme(scheme.to_string()))?;

        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

        Ok(socket.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::from(e))),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_recipient() {
        let client = SubscriberClient::new(Url::parse("http://localhost:8080/").unwrap());
        let url = client.endpoint("/sse", "user 42&x").unwrap();
        assert_eq!(url.path(), "/sse");
        assert_eq!(url.query(), Some("userId=user+42%26x"));
    }
}
