pub mod notification;
pub mod sse;

pub use notification::{NotificationPayload, NotificationStatus, attributes, channels};
pub use sse::SseDecoder;
