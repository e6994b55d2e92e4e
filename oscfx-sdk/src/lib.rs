//! Shared wire types for oscfx.
//!
//! `objects` holds everything that crosses the network: the serialized
//! event record, module (filter) requests and responses, effect records and
//! the WebSocket protocol. The `client` feature adds typed HTTP and
//! WebSocket clients.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
