//! Event processors.
//!
//! - `EventIngest`: Receives `RawMessage`, decodes it, forwards to the hub
//! - `BroadcastHub`: Receives `ControlEvent`, fans it out to every channel,
//!   evaluates modules and records firings

pub mod hub;
pub mod ingest;

pub use hub::{BroadcastHub, ConsumerChannel, HubError, ModuleChange, ModuleSnapshot, PublishReport};
pub use ingest::EventIngest;
