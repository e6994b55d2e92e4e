//! Event type definitions.

use compact_str::CompactString;
use oscfx_sdk::objects::{EventRecord, OscArg};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one consumer channel (one attached viewer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(Uuid);

impl ChannelId {
    /// Create a new time-ordered channel id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one module (filter instance) within a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(Uuid);

impl ModuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message as handed over by the transport, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl RawMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

/// A decoded control event.
///
/// Built only by [`crate::decoder::decode`], so every instance has a
/// well-formed address: `/Note_<note>_<reference>_<midi>_<velocity>`. The
/// leading `/` is part of the prefix segment and is not interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    pub(crate) address: CompactString,
    pub(crate) note_number: CompactString,
    pub(crate) ref_label: CompactString,
    /// `ref_label` lowercased, used for case-insensitive comparison.
    pub(crate) ref_key: CompactString,
    pub(crate) midi_number: i32,
    pub(crate) velocity: i32,
    pub(crate) args: Vec<OscArg>,
}

impl ControlEvent {
    /// The raw address; also the event's identity for edge detection.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Second address segment, passed through without interpretation.
    pub fn note_number(&self) -> &str {
        &self.note_number
    }

    pub fn ref_label(&self) -> &str {
        &self.ref_label
    }

    pub(crate) fn ref_key(&self) -> &str {
        &self.ref_key
    }

    pub fn midi_number(&self) -> i32 {
        self.midi_number
    }

    pub fn velocity(&self) -> i32 {
        self.velocity
    }

    /// Velocity 0 is a note-off and never matches a filter.
    pub fn is_note_off(&self) -> bool {
        self.velocity == 0
    }

    pub fn args(&self) -> &[OscArg] {
        &self.args
    }

    /// Serialize for fan-out egress.
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            address: self.address.to_string(),
            args: self.args.clone(),
        }
    }
}
