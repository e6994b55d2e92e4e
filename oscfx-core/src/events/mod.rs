//! Event types and channel infrastructure.
//!
//! # Event Flow
//!
//! 1. Transport delivers a [`RawMessage`] (address + passthrough args)
//! 2. The decoder turns it into a [`ControlEvent`] or drops it
//! 3. `BroadcastHub` appends the event to every attached channel's log,
//!    re-evaluates that channel's modules, and pushes a
//!    [`ChannelMessage`] per event and per firing onto the channel's egress
//!    queue
//!
//! Events are immutable once decoded and shared between channels behind
//! an `Arc`.

pub mod channels;
pub mod types;

pub use channels::{
    ChannelMessage, ChannelReceiver, ChannelSender, DEFAULT_CHANNEL_BUFFER, channel_egress,
};
pub use types::{ChannelId, ControlEvent, ModuleId, RawMessage};
