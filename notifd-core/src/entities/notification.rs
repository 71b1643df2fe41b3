use notifd_sdk::objects::{
    NotificationPayload, NotificationStatus as SdkNotificationStatus, attributes, channels,
};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;

/// Delivery status for database operations.
///
/// This is the sqlx::Type version. For wire use, see `notifd_sdk::objects::NotificationStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "notification_status")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Failed)
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", SdkNotificationStatus::from(*self))
    }
}

impl From<NotificationStatus> for SdkNotificationStatus {
    fn from(value: NotificationStatus) -> Self {
        match value {
            NotificationStatus::Pending => SdkNotificationStatus::Pending,
            NotificationStatus::Sent => SdkNotificationStatus::Sent,
            NotificationStatus::Failed => SdkNotificationStatus::Failed,
        }
    }
}

impl From<SdkNotificationStatus> for NotificationStatus {
    fn from(value: SdkNotificationStatus) -> Self {
        match value {
            SdkNotificationStatus::Pending => NotificationStatus::Pending,
            SdkNotificationStatus::Sent => NotificationStatus::Sent,
            SdkNotificationStatus::Failed => NotificationStatus::Failed,
        }
    }
}

/// Delivery channel. Unrecognised names are kept verbatim so they can be
/// reported and dead-lettered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Sms,
    Email,
    InApp,
    Other(String),
}

impl Channel {
    pub fn parse(name: &str) -> Self {
        match name {
            channels::SMS => Channel::Sms,
            channels::EMAIL => Channel::Email,
            channels::IN_APP => Channel::InApp,
            other => Channel::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Channel::Sms => channels::SMS,
            Channel::Email => channels::EMAIL,
            Channel::InApp => channels::IN_APP,
            Channel::Other(name) => name,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors decoding a raw stream payload. Never retried.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid notification payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notification payload has an empty notificationId")]
    MissingId,
}

/// Errors resolving a notification to a delivery primitive.
///
/// These can never succeed on retry, so they end delivery immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("channel {channel} requires the {key} attribute")]
    MissingAttribute {
        channel: &'static str,
        key: &'static str,
    },

    #[error("attribute {key} for channel {channel} must be a non-empty string")]
    InvalidAttribute {
        channel: &'static str,
        key: &'static str,
    },

    #[error("in-app notification has no recipient")]
    MissingRecipient,

    #[error("unsupported channel {0:?}")]
    UnknownChannel(String),
}

/// Returned when a status change would violate `pending -> terminal, once`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: NotificationStatus,
    pub to: NotificationStatus,
}

/// The delivery primitive selected for a notification, borrowing the
/// destination from the notification itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Sms { phone_number: &'a str },
    Email { recipient_email: &'a str },
    InApp { recipient_id: &'a str },
}

/// The unit of work flowing through the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub channel: Channel,
    pub body: String,
    pub status: NotificationStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub attributes: Map<String, Value>,
}

impl Notification {
    /// Decode a raw stream payload into a freshly accepted `pending`
    /// notification stamped at `now`.
    ///
    /// Whatever status and timestamps the producer supplied are discarded.
    /// Channel attributes are not checked here; see [`Notification::route`].
    pub fn decode(payload: &[u8], now: OffsetDateTime) -> Result<Self, DecodeError> {
        let payload: NotificationPayload = serde_json::from_slice(payload)?;
        Self::accept(payload, now)
    }

    /// Same as [`Notification::decode`] for an already parsed payload.
    pub fn accept(payload: NotificationPayload, now: OffsetDateTime) -> Result<Self, DecodeError> {
        if payload.notification_id.trim().is_empty() {
            return Err(DecodeError::MissingId);
        }

        Ok(Self {
            id: payload.notification_id,
            recipient_id: payload.user_id,
            channel: Channel::parse(&payload.channel),
            body: payload.message,
            status: NotificationStatus::Pending,
            created_at: now,
            updated_at: now,
            attributes: payload.meta_data,
        })
    }

    /// Serialize back into the stream shape (used for dead-lettering).
    pub fn to_payload(&self) -> NotificationPayload {
        NotificationPayload {
            notification_id: self.id.clone(),
            user_id: self.recipient_id.clone(),
            channel: self.channel.as_str().to_string(),
            message: self.body.clone(),
            status: Some(self.status.into()),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            meta_data: self.attributes.clone(),
        }
    }

    /// Move from `pending` to a terminal status and refresh `updated_at`.
    pub fn transition(
        &mut self,
        to: NotificationStatus,
        now: OffsetDateTime,
    ) -> Result<(), InvalidTransition> {
        if self.status != NotificationStatus::Pending || !to.is_terminal() {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Select the delivery primitive for this notification and check the
    /// attributes its channel requires.
    pub fn route(&self) -> Result<Route<'_>, ValidationError> {
        match &self.channel {
            Channel::Sms => Ok(Route::Sms {
                phone_number: self.required_attribute(channels::SMS, attributes::PHONE_NUMBER)?,
            }),
            Channel::Email => Ok(Route::Email {
                recipient_email: self
                    .required_attribute(channels::EMAIL, attributes::RECIPIENT_EMAIL)?,
            }),
            Channel::InApp => {
                if self.recipient_id.trim().is_empty() {
                    return Err(ValidationError::MissingRecipient);
                }
                Ok(Route::InApp {
                    recipient_id: &self.recipient_id,
                })
            }
            Channel::Other(name) => Err(ValidationError::UnknownChannel(name.clone())),
        }
    }

    fn required_attribute(
        &self,
        channel: &'static str,
        key: &'static str,
    ) -> Result<&str, ValidationError> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Err(ValidationError::MissingAttribute { channel, key }),
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.as_str()),
            Some(_) => Err(ValidationError::InvalidAttribute { channel, key }),
        }
    }
}
