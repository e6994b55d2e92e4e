//! Application state shared across all request handlers.

use oscfx_core::effects::{EffectAggregator, EffectName};
use oscfx_core::processors::BroadcastHub;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Fan-out hub owning every attached channel.
    pub hub: Arc<BroadcastHub>,
    /// Effect used when a module is created without one.
    pub default_effect: EffectName,
}

impl AppState {
    pub fn new(hub: Arc<BroadcastHub>, default_effect: EffectName) -> Self {
        Self {
            hub,
            default_effect,
        }
    }

    pub fn effects(&self) -> &Arc<EffectAggregator> {
        self.hub.effects()
    }
}
