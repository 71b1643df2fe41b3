//! DeliveryExecutor processor.
//!
//! The DeliveryExecutor is responsible for:
//! - Routing a notification to its delivery primitive (SMS sender, email
//!   sender or the subscriber registry)
//! - Retrying transient failures with exponential backoff (`2^k` units)
//! - Recording the terminal status exactly once
//! - Forwarding failed notifications to the dead-letter topic
//!
//! One `deliver` call owns one notification from `pending` to its terminal
//! status. Backoff sleeps happen on the caller's task.

use crate::config::{ConfigStore, DeliveryPolicy};
use crate::entities::{Notification, NotificationStatus, Route, ValidationError};
use crate::processors::dead_letter::DeadLetterForwarder;
use crate::registry::{PushError, SubscriberRegistry};
use crate::senders::{ChannelSender, SendError};
use crate::store::StatusStore;
use crate::utils::backoff::backoff_delay;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};

/// Failure of a single delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("send failed: {0}")]
    Send(#[from] SendError),

    #[error("push failed: {0}")]
    Push(#[from] PushError),
}

impl DeliveryError {
    /// Whether a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DeliveryError::Validation(_))
    }
}

/// Terminal result of [`DeliveryExecutor::deliver`].
#[derive(Debug)]
pub enum DeliveryOutcome {
    Sent { attempts: u32 },
    Failed { attempts: u32, error: DeliveryError },
}

impl DeliveryOutcome {
    pub fn status(&self) -> NotificationStatus {
        match self {
            DeliveryOutcome::Sent { .. } => NotificationStatus::Sent,
            DeliveryOutcome::Failed { .. } => NotificationStatus::Failed,
        }
    }

    /// Attempts made, including the one that ended delivery.
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Sent { attempts } | DeliveryOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

pub struct DeliveryExecutor {
    sms: Arc<dyn ChannelSender>,
    email: Arc<dyn ChannelSender>,
    registry: Arc<SubscriberRegistry>,
    store: Arc<dyn StatusStore>,
    dead_letter: DeadLetterForwarder,
    policy: ConfigStore<DeliveryPolicy>,
}

impl DeliveryExecutor {
    pub fn new(
        sms: Arc<dyn ChannelSender>,
        email: Arc<dyn ChannelSender>,
        registry: Arc<SubscriberRegistry>,
        store: Arc<dyn StatusStore>,
        dead_letter: DeadLetterForwarder,
        policy: ConfigStore<DeliveryPolicy>,
    ) -> Self {
        Self {
            sms,
            email,
            registry,
            store,
            dead_letter,
            policy,
        }
    }

    /// Drive `notification` to a terminal status.
    ///
    /// Uses the delivery policy current at the time of the call, even if it
    /// is reloaded while this notification is backing off.
    #[instrument(
        skip_all,
        name = "deliver",
        fields(notification_id = %notification.id, channel = %notification.channel)
    )]
    pub async fn deliver(&self, mut notification: Notification) -> DeliveryOutcome {
        let policy = self.policy.snapshot().await;
        let outcome = self.run_attempts(&notification, &policy).await;
        self.finish(&mut notification, &outcome).await;
        outcome
    }

    async fn run_attempts(
        &self,
        notification: &Notification,
        policy: &DeliveryPolicy,
    ) -> DeliveryOutcome {
        let max_attempts = policy.max_retries.max(1);
        let mut attempt = 0u32;

        loop {
            debug!(attempt, "Attempting delivery");

            let error = match self.attempt(notification).await {
                Ok(()) => {
                    info!(attempts = attempt + 1, "Notification delivered");
                    return DeliveryOutcome::Sent {
                        attempts: attempt + 1,
                    };
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                warn!(attempt, error = %error, "Delivery failed permanently");
                return DeliveryOutcome::Failed {
                    attempts: attempt + 1,
                    error,
                };
            }

            if attempt + 1 >= max_attempts {
                warn!(attempt, error = %error, "Delivery retries exhausted");
                return DeliveryOutcome::Failed {
                    attempts: attempt + 1,
                    error,
                };
            }

            let delay = backoff_delay(attempt, policy);
            warn!(
                attempt,
                error = %error,
                retry_in_ms = delay.as_millis() as u64,
                "Delivery attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One invocation of the routed primitive. Validation runs first, so an
    /// invalid notification never reaches a sender.
    async fn attempt(&self, notification: &Notification) -> Result<(), DeliveryError> {
        match notification.route()? {
            Route::Sms { phone_number } => {
                self.sms.send(phone_number, &notification.body).await?
            }
            Route::Email { recipient_email } => {
                self.email.send(recipient_email, &notification.body).await?
            }
            Route::InApp { recipient_id } => {
                self.registry.push(recipient_id, &notification.body)?
            }
        }
        Ok(())
    }

    /// Apply the terminal transition, persist it, and dead-letter failures.
    async fn finish(&self, notification: &mut Notification, outcome: &DeliveryOutcome) {
        let now = OffsetDateTime::now_utc();
        if let Err(e) = notification.transition(outcome.status(), now) {
            error!(error = %e, "Refusing to record status twice");
            return;
        }

        if let Err(e) = self
            .store
            .update_status(&notification.id, notification.status, notification.updated_at)
            .await
        {
            error!(
                status = %notification.status,
                error = %e,
                "Failed to record notification status"
            );
        }

        if notification.status == NotificationStatus::Failed {
            self.dead_letter.forward(notification).await;
        }
    }
}
