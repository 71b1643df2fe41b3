pub mod notification;
pub mod notification_records;
pub mod stream_events;

pub use notification::{
    Channel, DecodeError, InvalidTransition, Notification, NotificationStatus, Route,
    ValidationError,
};
