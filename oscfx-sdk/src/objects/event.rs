//! Serialized form of a relayed control event.
//!
//! Every event published by the hub reaches viewers as an [`EventRecord`]:
//! the raw OSC address plus whatever arguments the controller attached,
//! passed through unexamined.

use serde::{Deserialize, Serialize};

/// A single OSC argument, reduced to JSON-friendly shapes.
///
/// Serialized untagged so a record looks like the plain OSC message:
///
/// ```json
/// {"address":"/Note_1_Alice_40_5","args":[1, 0.5, "x"]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OscArg {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Blob(Vec<u8>),
    Nil,
}

/// An event as delivered to every attached viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Raw address, e.g. `/Note_<note>_<reference>_<midi>_<velocity>`.
    pub address: String,
    /// Passthrough arguments, in the order they arrived.
    #[serde(default)]
    pub args: Vec<OscArg>,
}
