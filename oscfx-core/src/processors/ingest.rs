//! EventIngest processor.
//!
//! Entry point for transports. Takes a [`RawMessage`], decodes it and hands
//! the result to the [`BroadcastHub`]. Malformed messages are logged and
//! counted, never delivered.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kanau::processor::Processor;
use tracing::warn;

use super::hub::{BroadcastHub, PublishReport};
use crate::decoder::decode;
use crate::events::RawMessage;

pub struct EventIngest {
    hub: Arc<BroadcastHub>,
    malformed: AtomicU64,
}

impl EventIngest {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self {
            hub,
            malformed: AtomicU64::new(0),
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Number of messages dropped because they failed to decode.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

impl Processor<RawMessage> for EventIngest {
    /// `None` when the message was malformed and dropped.
    type Output = Option<PublishReport>;
    type Error = Infallible;

    async fn process(&self, message: RawMessage) -> Result<Option<PublishReport>, Infallible> {
        match decode(&message.address, message.args) {
            Ok(event) => Ok(Some(self.hub.publish(event).await)),
            Err(error) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(address = %message.address, %error, "Dropping malformed event");
                Ok(None)
            }
        }
    }
}
