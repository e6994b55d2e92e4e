//! Runtime configuration for the core pipeline.
//!
//! These are the validated values the hub runs with. Reading them from a
//! file or the command line is the server crate's job.

use crate::event_log::Retention;
use crate::events::DEFAULT_CHANNEL_BUFFER;

/// Hub settings shared by every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// History kept by each channel's log.
    pub retention: Retention,
    /// Capacity of each channel's egress queue.
    pub channel_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            retention: Retention::default(),
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
        }
    }
}
