//! Edge dispatcher.
//!
//! Each module re-evaluates its match on every publish and every filter
//! change, but should fire only when the match actually changes. The
//! dispatcher remembers the address it last fired for and compares by value:
//!
//! | state            | current match       | action                        |
//! |------------------|---------------------|-------------------------------|
//! | any              | none                | nothing                       |
//! | `Armed(a)`       | address `a`         | nothing (repeat)              |
//! | `Idle`/`Armed(a)`| address `b != a`    | fire, move to `Armed(b)`      |
//!
//! Only the last dispatched address is remembered, so `X, Y, X` fires three
//! times.

use compact_str::CompactString;
use time::OffsetDateTime;

use crate::effects::EffectName;
use crate::events::ControlEvent;

/// Dispatcher state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing dispatched yet.
    #[default]
    Idle,
    /// Last dispatched address.
    Armed(CompactString),
}

/// A dispatch decision, handed to the effect aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub effect: EffectName,
    pub address: CompactString,
    pub at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct EdgeDispatcher {
    effect: EffectName,
    state: DispatchState,
}

impl EdgeDispatcher {
    pub fn new(effect: EffectName) -> Self {
        Self {
            effect,
            state: DispatchState::Idle,
        }
    }

    pub fn effect(&self) -> &EffectName {
        &self.effect
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    /// Address of the last dispatch, if any.
    pub fn last_dispatched(&self) -> Option<&str> {
        match &self.state {
            DispatchState::Idle => None,
            DispatchState::Armed(address) => Some(address.as_str()),
        }
    }

    /// Feed the current match. Returns a dispatch when it is a new address.
    pub fn observe(&mut self, current: Option<&ControlEvent>) -> Option<Dispatch> {
        let event = current?;
        if self.last_dispatched() == Some(event.address()) {
            return None;
        }

        let address = CompactString::from(event.address());
        self.state = DispatchState::Armed(address.clone());
        Some(Dispatch {
            effect: self.effect.clone(),
            address,
            at: OffsetDateTime::now_utc(),
        })
    }
}
