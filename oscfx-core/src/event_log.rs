//! Per-channel event log.
//!
//! The log is what a channel's modules scan to find their most recent
//! match. Two retention policies are supported:
//!
//! - [`Retention::Unbounded`] keeps every delivered event, in arrival order.
//! - [`Retention::LatestPerKey`] keeps, for each
//!   `(lowercased reference label, MIDI number)` pair, only the newest event,
//!   and never keeps note-offs.
//!
//! Every filter gate is a function of that key plus the velocity, so the
//! newest qualifying event for any filter is the same under both policies.
//! The bounded policy only forgets events that are shadowed by a newer event
//! with the same key, plus whole keys once more than `max_keys` are live
//! (oldest first).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use compact_str::CompactString;

use crate::events::ControlEvent;

/// Default cap on live keys for [`Retention::LatestPerKey`].
pub const DEFAULT_MAX_KEYS: usize = 4096;

/// How much history a channel keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Keep every event. Memory grows with the session.
    Unbounded,
    /// Keep the newest event per key, for at most `max_keys` keys.
    LatestPerKey { max_keys: usize },
}

impl Default for Retention {
    fn default() -> Self {
        Retention::LatestPerKey {
            max_keys: DEFAULT_MAX_KEYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LogKey {
    ref_key: CompactString,
    midi_number: i32,
}

impl LogKey {
    fn of(event: &ControlEvent) -> Self {
        Self {
            ref_key: CompactString::from(event.ref_key()),
            midi_number: event.midi_number(),
        }
    }
}

/// Ordered event history of one channel.
#[derive(Debug)]
pub struct EventLog {
    retention: Retention,
    /// Retained events keyed by arrival sequence number.
    entries: BTreeMap<u64, Arc<ControlEvent>>,
    /// Sequence number of the retained event for each key (bounded mode only).
    latest: HashMap<LogKey, u64>,
    next_seq: u64,
}

impl EventLog {
    pub fn new(retention: Retention) -> Self {
        Self {
            retention,
            entries: BTreeMap::new(),
            latest: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Append an event at the newest end of the log.
    pub fn append(&mut self, event: Arc<ControlEvent>) {
        let seq = self.next_seq;
        self.next_seq += 1;

        match self.retention {
            Retention::Unbounded => {
                self.entries.insert(seq, event);
            }
            Retention::LatestPerKey { max_keys } => {
                if event.is_note_off() {
                    return;
                }
                if let Some(previous) = self.latest.insert(LogKey::of(&event), seq) {
                    self.entries.remove(&previous);
                }
                self.entries.insert(seq, event);

                while self.latest.len() > max_keys.max(1) {
                    let Some((_, evicted)) = self.entries.pop_first() else {
                        break;
                    };
                    self.latest.remove(&LogKey::of(&evicted));
                }
            }
        }
    }

    /// Retained events, newest first.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &Arc<ControlEvent>> {
        self.entries.values().rev()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of events ever appended, retained or not.
    pub fn delivered(&self) -> u64 {
        self.next_seq
    }

    /// Drop all retained events.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.latest.clear();
    }
}
