//! Shared wire types for notifd.
//!
//! Producers use [`objects::NotificationPayload`] to publish events onto the
//! stream; subscribers use the `client` feature to follow the real-time
//! endpoints.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
