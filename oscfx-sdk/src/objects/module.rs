//! Module (filter instance) request and response types.
//!
//! A module belongs to one viewer channel. It filters the channel's event
//! stream by reference label and MIDI note allow-list, and fires its effect
//! whenever its most recent match changes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for creating a module.
///
/// All fields are optional: an empty reference and an empty note list match
/// everything, and a missing effect falls back to the server default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateModule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default)]
    pub reference: String,
    /// Comma-separated MIDI note numbers, e.g. `"36,38,40"`.
    #[serde(default)]
    pub notes: String,
}

/// Request body for changing a module's reference filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReference {
    pub reference: String,
}

/// Request body for changing a module's note allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNotes {
    /// Comma-separated MIDI note numbers. Tokens that are not integers are
    /// dropped and echoed back in [`ModuleResponse::rejected_notes`].
    pub notes: String,
}

/// Current state of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleResponse {
    pub module_id: Uuid,
    pub channel_id: Uuid,
    pub effect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_notes: Vec<String>,
    /// Address of the most recently dispatched match, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_match: Option<String>,
}
