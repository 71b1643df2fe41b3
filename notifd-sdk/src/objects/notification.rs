//! Notification event payload as carried on the event stream.
//!
//! The same JSON shape is used for inbound events and for entries published
//! to the dead-letter topic, so a dead-lettered notification can be replayed
//! onto the inbound topic unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Well-known channel names.
///
/// The channel set is open: producers may publish any string, and values the
/// dispatcher does not recognise fail at routing time rather than at decode
/// time.
pub mod channels {
    pub const SMS: &str = "sms";
    pub const EMAIL: &str = "email";
    pub const IN_APP: &str = "inapp";
}

/// Keys in `metaData` read by the built-in channels.
pub mod attributes {
    /// Destination phone number for the `sms` channel.
    pub const PHONE_NUMBER: &str = "phoneNumber";
    /// Destination address for the `email` channel.
    pub const RECIPIENT_EMAIL: &str = "recipientEmail";
}

/// Delivery status for API and stream payloads.
///
/// This is the wire version without `sqlx::Type`.
/// For database operations, use the version in `notifd-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown notification status: {0:?}")]
pub struct UnknownStatus(pub String);

/// A notification event as serialized on the stream.
///
/// `status`, `createdAt` and `updatedAt` are informational on inbound events;
/// the dispatcher restamps them when it accepts the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub notification_id: String,
    #[serde(default)]
    pub user_id: String,
    pub channel: String,
    #[serde(default)]
    pub message: String,
    #[serde(
        default,
        deserialize_with = "lenient_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<NotificationStatus>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub meta_data: Map<String, Value>,
}

impl NotificationPayload {
    /// Build a new outbound payload with no timestamps or status.
    pub fn new(
        notification_id: impl Into<String>,
        user_id: impl Into<String>,
        channel: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_id: notification_id.into(),
            user_id: user_id.into(),
            channel: channel.into(),
            message: message.into(),
            status: None,
            created_at: None,
            updated_at: None,
            meta_data: Map::new(),
        }
    }

    /// Attach a `metaData` entry.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta_data.insert(key.into(), value.into());
        self
    }
}

// Producers written against loosely typed encoders emit `""` for an unset
// status; anything unrecognised is treated as absent.
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<NotificationStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_event() {
        let json = r#"{
            "notificationId": "n1",
            "userId": "u1",
            "channel": "sms",
            "message": "hello",
            "status": "pending",
            "createdAt": "0001-01-01T00:00:00Z",
            "updatedAt": "2025-03-01T10:00:00.123456789+07:00",
            "metaData": {"phoneNumber": "+84900000000", "priority": 3, "urgent": true}
        }"#;
        let payload: NotificationPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.notification_id, "n1");
        assert_eq!(payload.user_id, "u1");
        assert_eq!(payload.channel, channels::SMS);
        assert_eq!(payload.status, Some(NotificationStatus::Pending));
        assert!(payload.created_at.is_some());
        assert_eq!(
            payload.meta_data.get(attributes::PHONE_NUMBER),
            Some(&Value::from("+84900000000"))
        );
        assert_eq!(payload.meta_data.get("priority"), Some(&Value::from(3)));
    }

    #[test]
    fn test_decode_tolerates_missing_and_null_fields() {
        let json =
            r#"{"notificationId": "n2", "channel": "inapp", "status": "", "metaData": null}"#;
        let payload: NotificationPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.user_id, "");
        assert_eq!(payload.message, "");
        assert_eq!(payload.status, None);
        assert!(payload.meta_data.is_empty());
    }

    #[test]
    fn test_decode_rejects_missing_channel() {
        let json = r#"{"notificationId": "n3", "message": "x"}"#;
        assert!(serde_json::from_str::<NotificationPayload>(json).is_err());
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let payload = NotificationPayload::new("n4", "u4", channels::EMAIL, "body")
            .with_attribute(attributes::RECIPIENT_EMAIL, "a@b.com");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["notificationId"], "n4");
        assert_eq!(value["userId"], "u4");
        assert_eq!(value["metaData"]["recipientEmail"], "a@b.com");
        assert!(value.get("status").is_none());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("sent".parse::<NotificationStatus>().unwrap(), NotificationStatus::Sent);
        assert!("delivered".parse::<NotificationStatus>().is_err());
        assert_eq!(NotificationStatus::Failed.to_string(), "failed");
    }
}
