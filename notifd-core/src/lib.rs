#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod processors;
pub mod registry;
pub mod senders;
pub mod store;
pub mod stream;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
