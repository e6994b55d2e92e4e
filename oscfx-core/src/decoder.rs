//! Event decoder.
//!
//! Turns a raw address such as `Note_1_Alice_40_5` into a [`ControlEvent`].
//! The address is split on `_`; the first five segments are
//! prefix, note number, reference label, MIDI number and velocity. Anything
//! after the fifth segment is ignored. The prefix and note number are not
//! interpreted.

use compact_str::CompactString;
use oscfx_sdk::objects::OscArg;
use thiserror::Error;

use crate::events::{ControlEvent, RawMessage};

/// Minimum number of `_`-delimited address segments.
pub const MIN_SEGMENTS: usize = 5;

/// Reasons an address is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected at least 5 '_'-delimited segments, found {found}")]
    TooFewSegments { found: usize },

    #[error("midi number {0:?} does not start with a base-10 integer")]
    InvalidMidiNumber(String),

    #[error("velocity {0:?} does not start with a base-10 integer")]
    InvalidVelocity(String),
}

/// Read the base-10 integer at the start of `text`.
///
/// Leading whitespace and one `+`/`-` sign are accepted, then as many
/// decimal digits as follow; anything after the digits is ignored, so
/// `"5.5"` reads as 5 and `"40abc"` as 40. Returns `None` when no digit
/// follows the sign or the value does not fit in an `i32`.
pub fn parse_leading_int(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let sign_len = text.len() - unsigned.len();
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits == 0 {
        return None;
    }
    text[..sign_len + digits].parse().ok()
}

/// Decode an address and its passthrough arguments.
pub fn decode(address: &str, args: Vec<OscArg>) -> Result<ControlEvent, DecodeError> {
    let segments: Vec<&str> = address.split('_').collect();
    let [_prefix, note_number, ref_label, midi, velocity, ..] = segments.as_slice() else {
        return Err(DecodeError::TooFewSegments {
            found: segments.len(),
        });
    };

    let midi_number = parse_leading_int(midi)
        .ok_or_else(|| DecodeError::InvalidMidiNumber((*midi).to_string()))?;
    let velocity = parse_leading_int(velocity)
        .ok_or_else(|| DecodeError::InvalidVelocity((*velocity).to_string()))?;

    Ok(ControlEvent {
        address: CompactString::from(address),
        note_number: CompactString::from(*note_number),
        ref_label: CompactString::from(*ref_label),
        ref_key: CompactString::from(ref_label.to_lowercase()),
        midi_number,
        velocity,
        args,
    })
}

impl TryFrom<RawMessage> for ControlEvent {
    type Error = DecodeError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        decode(&raw.address, raw.args)
    }
}
