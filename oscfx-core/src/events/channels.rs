//! Per-channel egress queues.
//!
//! Each consumer channel owns a bounded queue fed by the hub. The hub only
//! ever uses `try_send`, so a slow or vanished viewer loses messages
//! instead of stalling delivery to everyone else.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::types::ControlEvent;
use crate::effects::Firing;

/// Default buffer size for a channel's egress queue.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Something the hub delivers to one channel.
#[derive(Debug, Clone)]
pub enum ChannelMessage {
    /// A published event, in hub arrival order.
    Event(Arc<ControlEvent>),
    /// One of the channel's modules fired.
    Fired(Firing),
}

/// Sender half of a channel's egress queue (held by the hub).
pub type ChannelSender = mpsc::Sender<ChannelMessage>;
/// Receiver half of a channel's egress queue (held by the transport).
pub type ChannelReceiver = mpsc::Receiver<ChannelMessage>;

/// Create a new egress queue with room for `buffer` messages.
pub fn channel_egress(buffer: usize) -> (ChannelSender, ChannelReceiver) {
    mpsc::channel(buffer.max(1))
}
