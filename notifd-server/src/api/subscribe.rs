//! Real-time subscriber endpoints.
//!
//! # Endpoints
//!
//! - `GET /sse?userId=<id>` – Server-Sent Events stream, one `data:` event per push
//! - `GET /ws?userId=<id>`  – WebSocket stream, one text frame per push
//!
//! Both register a connection in the [`SubscriberRegistry`] for the
//! recipient and unregister it when the client goes away. A newer
//! connection for the same recipient ends the older one.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::Stream;
use notifd_core::registry::{SubscriberConnection, SubscriberRegistry};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct SubscribeQuery {
    #[serde(rename = "userId", default)]
    user_id: String,
}

impl SubscribeQuery {
    fn recipient(self) -> Result<String, SubscribeError> {
        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(SubscribeError::MissingRecipient);
        }
        Ok(user_id.to_string())
    }
}

/// Unregisters its connection when dropped, unless a newer connection for
/// the same recipient has taken over.
struct SubscriptionGuard {
    registry: Arc<SubscriberRegistry>,
    recipient_id: String,
    connection_id: Uuid,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry
            .unregister_connection(&self.recipient_id, self.connection_id);
        tracing::debug!(recipient_id = %self.recipient_id, "Subscriber stream closed");
    }
}

/// `GET /sse?userId=<id>` - subscribe to pushes over Server-Sent Events.
pub(super) async fn subscribe_sse(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, SubscribeError> {
    let recipient_id = query.recipient()?;

    let (connection, stream) = SubscriberConnection::channel(state.subscribers.buffer);
    let guard = SubscriptionGuard {
        registry: state.registry.clone(),
        recipient_id: recipient_id.clone(),
        connection_id: stream.id(),
    };
    state.registry.register(recipient_id, connection);

    // The guard lives exactly as long as the response stream.
    let events = ReceiverStream::new(stream.into_receiver()).map(move |message| {
        let _guard = &guard;
        Ok(Event::default().data(message))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// `GET /ws?userId=<id>` - subscribe to pushes over a WebSocket.
pub(super) async fn subscribe_ws(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, SubscribeError> {
    let recipient_id = query.recipient()?;
    Ok(ws.on_upgrade(move |socket| handle_subscriber_ws(socket, state, recipient_id)))
}

/// Drives one WebSocket until the client disconnects or the registry
/// drops the connection (replacement or shutdown).
async fn handle_subscriber_ws(mut socket: WebSocket, state: AppState, recipient_id: String) {
    let (connection, mut stream) = SubscriberConnection::channel(state.subscribers.buffer);
    let _guard = SubscriptionGuard {
        registry: state.registry.clone(),
        recipient_id: recipient_id.clone(),
        connection_id: stream.id(),
    };
    state.registry.register(recipient_id, connection);

    loop {
        tokio::select! {
            pushed = stream.recv() => match pushed {
                Some(message) => {
                    if socket.send(Message::Text(message.into())).await.is_err() {
                        return;
                    }
                }
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
            },

            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}

#[derive(Debug)]
pub(super) enum SubscribeError {
    /// The `userId` query parameter is missing or blank.
    MissingRecipient,
}

impl IntoResponse for SubscribeError {
    fn into_response(self) -> Response {
        match self {
            SubscribeError::MissingRecipient => (
                StatusCode::BAD_REQUEST,
                "userId query parameter is required",
            )
                .into_response(),
        }
    }
}
