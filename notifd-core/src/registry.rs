//! Registry of live real-time subscriber connections.
//!
//! A connection is a bounded channel: the registry keeps the sending half
//! keyed by recipient, and the HTTP endpoint that accepted the subscriber
//! drains the receiving half onto the wire. At most one connection per
//! recipient is kept; registering again replaces (and thereby closes) the
//! previous one.
//!
//! One mutex guards the whole map. Every operation is an O(1) map access
//! plus a non-blocking channel write, so the lock is never held across an
//! await point.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

/// Reasons a push did not reach a subscriber. All of them are retryable
/// from the delivery executor's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("recipient {0} is not connected")]
    NotConnected(String),

    /// The subscriber went away; its entry has been removed.
    #[error("connection for recipient {0} is closed")]
    ConnectionClosed(String),

    /// The subscriber is not draining its buffer.
    #[error("connection for recipient {0} is not keeping up")]
    Lagging(String),
}

/// Sending half of a subscriber connection, owned by the registry.
#[derive(Debug)]
pub struct SubscriberConnection {
    id: Uuid,
    tx: mpsc::Sender<String>,
}

/// Receiving half of a subscriber connection, owned by the endpoint task.
///
/// Yields `None` once the registry drops the connection (replacement,
/// unregistration or shutdown).
#[derive(Debug)]
pub struct SubscriberStream {
    id: Uuid,
    rx: mpsc::Receiver<String>,
}

impl SubscriberConnection {
    /// Create a connection pair buffering up to `buffer` undelivered messages.
    pub fn channel(buffer: usize) -> (SubscriberConnection, SubscriberStream) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = Uuid::now_v7();
        (SubscriberConnection { id, tx }, SubscriberStream { id, rx })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl SubscriberStream {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next pushed message.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn into_receiver(self) -> mpsc::Receiver<String> {
        self.rx
    }
}

#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    connections: Mutex<HashMap<String, SubscriberConnection>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, SubscriberConnection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `connection` for `recipient_id`.
    ///
    /// Returns `true` if an existing connection was replaced. The replaced
    /// connection is dropped, which ends its [`SubscriberStream`].
    pub fn register(
        &self,
        recipient_id: impl Into<String>,
        connection: SubscriberConnection,
    ) -> bool {
        let recipient_id = recipient_id.into();
        let connection_id = connection.id;
        let replaced = self.lock().insert(recipient_id.clone(), connection);
        debug!(
            %recipient_id,
            %connection_id,
            replaced = replaced.is_some(),
            "Subscriber registered"
        );
        replaced.is_some()
    }

    /// Remove whatever connection is registered for `recipient_id`.
    ///
    /// Returns `false` (and changes nothing) when none is registered.
    pub fn unregister(&self, recipient_id: &str) -> bool {
        let removed = self.lock().remove(recipient_id).is_some();
        if removed {
            debug!(%recipient_id, "Subscriber unregistered");
        }
        removed
    }

    /// Remove the connection for `recipient_id` only if it is still
    /// `connection_id`.
    ///
    /// Endpoints call this when their subscriber disconnects, so a late
    /// cleanup never evicts a newer connection for the same recipient.
    pub fn unregister_connection(&self, recipient_id: &str, connection_id: Uuid) -> bool {
        let mut connections = self.lock();
        let current = connections
            .get(recipient_id)
            .is_some_and(|conn| conn.id == connection_id);
        if current {
            connections.remove(recipient_id);
            debug!(%recipient_id, %connection_id, "Subscriber disconnected");
        }
        current
    }

    /// Push `message` to the recipient's live connection.
    ///
    /// A connection whose receiving half is gone is removed, so later pushes
    /// report [`PushError::NotConnected`].
    pub fn push(&self, recipient_id: &str, message: &str) -> Result<(), PushError> {
        let mut connections = self.lock();
        let Some(connection) = connections.get(recipient_id) else {
            return Err(PushError::NotConnected(recipient_id.to_string()));
        };

        match connection.tx.try_send(message.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PushError::Lagging(recipient_id.to_string())),
            Err(TrySendError::Closed(_)) => {
                connections.remove(recipient_id);
                debug!(%recipient_id, "Removed stale subscriber connection");
                Err(PushError::ConnectionClosed(recipient_id.to_string()))
            }
        }
    }

    pub fn is_connected(&self, recipient_id: &str) -> bool {
        self.lock().contains_key(recipient_id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every connection, ending all subscriber streams. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let mut connections = self.lock();
        let closed = connections.len();
        connections.clear();
        closed
    }
}
