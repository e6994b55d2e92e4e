#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod effects;
pub mod event_log;
pub mod events;
pub mod filter;
pub mod processors;
