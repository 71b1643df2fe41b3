//! Test doubles shared by the processor tests.

use crate::config::{ConfigStore, DeliveryPolicy};
use crate::entities::{Notification, NotificationStatus};
use crate::events::{RawEvent, RawEventReceiver, raw_event_channel};
use crate::processors::{DeadLetterForwarder, DeliveryExecutor};
use crate::registry::SubscriberRegistry;
use crate::senders::{ChannelSender, SendError};
use crate::store::{PersistenceError, StatusStore};
use crate::stream::ChannelEventPublisher;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;

pub(crate) const DEAD_LETTER_TOPIC: &str = "notification_events_dlq";

#[derive(Debug, Clone)]
pub(crate) struct SentMessage {
    pub destination: String,
    pub body: String,
    pub at: Instant,
}

/// Channel sender whose outcomes are scripted in advance.
///
/// Outcomes are consumed in order; once the script runs out every call
/// returns `fallback`.
pub(crate) struct ScriptedSender {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: Mutex<Vec<SentMessage>>,
}

impl ScriptedSender {
    pub fn scripted(outcomes: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::scripted([], true)
    }

    pub fn failing() -> Self {
        Self::scripted([], false)
    }

    pub fn calls(&self) -> Vec<SentMessage> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelSender for ScriptedSender {
    async fn send(&self, destination: &str, body: &str) -> Result<(), SendError> {
        self.calls.lock().unwrap().push(SentMessage {
            destination: destination.to_string(),
            body: body.to_string(),
            at: Instant::now(),
        });
        let succeed = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        if succeed {
            Ok(())
        } else {
            Err(SendError::Rejected {
                status: 503,
                body: "scripted failure".to_string(),
            })
        }
    }
}

/// In-memory status store with switchable failures.
#[derive(Default)]
pub(crate) struct MemoryStatusStore {
    records: Mutex<HashMap<String, (NotificationStatus, OffsetDateTime)>>,
    updates: Mutex<Vec<(String, NotificationStatus)>>,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn status(&self, id: &str) -> Option<NotificationStatus> {
        self.records.lock().unwrap().get(id).map(|(status, _)| *status)
    }

    /// Every `update_status` call received, including failed ones.
    pub fn updates(&self) -> Vec<(String, NotificationStatus)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn insert_pending(&self, notification: &Notification) -> Result<(), PersistenceError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("scripted outage".into()));
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&notification.id) {
            return Err(PersistenceError::Duplicate(notification.id.clone()));
        }
        records.insert(
            notification.id.clone(),
            (notification.status, notification.updated_at),
        );
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: NotificationStatus,
        updated_at: OffsetDateTime,
    ) -> Result<(), PersistenceError> {
        self.updates.lock().unwrap().push((id.to_string(), status));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("scripted outage".into()));
        }
        match self.records.lock().unwrap().get_mut(id) {
            Some(record) => {
                *record = (status, updated_at);
                Ok(())
            }
            None => Err(PersistenceError::NotFound(id.to_string())),
        }
    }
}

/// A one-second-unit policy with the given budget.
pub(crate) fn policy(max_retries: u32) -> DeliveryPolicy {
    DeliveryPolicy {
        max_retries,
        backoff_unit: Duration::from_secs(1),
        ..DeliveryPolicy::default()
    }
}

/// Executor wired to test doubles, with handles to inspect each of them.
pub(crate) struct Harness {
    pub sms: Arc<ScriptedSender>,
    pub email: Arc<ScriptedSender>,
    pub registry: Arc<SubscriberRegistry>,
    pub store: Arc<MemoryStatusStore>,
    pub dead_letters: RawEventReceiver,
    pub policy: ConfigStore<DeliveryPolicy>,
    pub executor: Arc<DeliveryExecutor>,
}

impl Harness {
    pub fn new(sms: ScriptedSender, email: ScriptedSender, policy: DeliveryPolicy) -> Self {
        let sms = Arc::new(sms);
        let email = Arc::new(email);
        let registry = Arc::new(SubscriberRegistry::new());
        let store = Arc::new(MemoryStatusStore::new());
        let (dlq_tx, dead_letters) = raw_event_channel();
        let dead_letter = DeadLetterForwarder::new(
            Arc::new(ChannelEventPublisher::new(dlq_tx)),
            DEAD_LETTER_TOPIC,
        );
        let policy = ConfigStore::new(policy);
        let executor = Arc::new(DeliveryExecutor::new(
            sms.clone(),
            email.clone(),
            registry.clone(),
            store.clone(),
            dead_letter,
            policy.clone(),
        ));
        Self {
            sms,
            email,
            registry,
            store,
            dead_letters,
            policy,
            executor,
        }
    }

    /// Drain every dead letter published so far.
    pub fn take_dead_letters(&mut self) -> Vec<RawEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.dead_letters.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Decode a notification from a JSON value, stamped at the current instant.
pub(crate) fn notification(value: serde_json::Value) -> Notification {
    let bytes = serde_json::to_vec(&value).unwrap();
    Notification::decode(&bytes, OffsetDateTime::now_utc()).unwrap()
}
