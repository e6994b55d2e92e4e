//! WebSocket message types for the viewer stream.
//!
//! The `GET /ws` endpoint upgrades to a WebSocket connection that acts as
//! one consumer channel.
//!
//! # Protocol
//!
//! 1. The server sends [`WsServerMessage::Welcome`] with the id of the
//!    channel it attached for this connection.
//! 2. Every published event arrives as [`WsServerMessage::Event`], in the
//!    order the server received it.
//! 3. Whenever one of this channel's modules fires, the server sends
//!    [`WsServerMessage::Fired`].
//! 4. The client manages its modules with [`WsClientMessage`] frames; each
//!    is answered with [`WsServerMessage::Module`],
//!    [`WsServerMessage::ModuleRemoved`] or [`WsServerMessage::Error`].
//! 5. Closing the socket detaches the channel and drops its modules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::effects::FiringRecord;
use super::event::EventRecord;
use super::module::ModuleResponse;

/// Server-to-client WebSocket message.
///
/// Internally tagged on `"type"`:
///
/// ```json
/// {"type":"welcome","channel_id":"..."}
/// {"type":"event","event":{"address":"/Note_1_Alice_40_5","args":[]}}
/// {"type":"error","code":4004,"reason":"module not found"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// First frame on every connection.
    Welcome { channel_id: Uuid },

    /// A relayed control event.
    Event { event: EventRecord },

    /// One of this channel's modules fired its effect.
    Fired { firing: FiringRecord },

    /// A module was created or changed.
    Module { module: ModuleResponse },

    /// A module was removed.
    ModuleRemoved { module_id: Uuid },

    /// A client request could not be applied. The connection stays open.
    Error {
        /// Application-level error code (see [`WsCloseCode`]).
        code: u16,
        /// Human-readable reason.
        reason: String,
    },
}

/// Client-to-server WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    AddModule {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        effect: Option<String>,
        #[serde(default)]
        reference: String,
        #[serde(default)]
        notes: String,
    },
    RemoveModule {
        module_id: Uuid,
    },
    SetReference {
        module_id: Uuid,
        reference: String,
    },
    SetNotes {
        module_id: Uuid,
        notes: String,
    },
}

/// Well-known close and error codes used on the viewer stream.
///
/// Codes in the 4000–4999 range are reserved for application use by
/// [RFC 6455 §7.4.2](https://www.rfc-editor.org/rfc/rfc6455#section-7.4.2).
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;

    /// An unexpected server-side error.
    pub const INTERNAL_ERROR: u16 = 1011;

    /// The client frame was not a valid [`WsClientMessage`].
    pub const INVALID_MESSAGE: u16 = 4000;

    /// The referenced module does not exist on this channel.
    pub const MODULE_NOT_FOUND: u16 = 4004;

    /// The requested effect name is not acceptable.
    pub const INVALID_EFFECT: u16 = 4022;
}
