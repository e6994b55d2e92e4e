//! Filter instances ("modules").
//!
//! A module owns a [`FilterSpec`] and an [`EdgeDispatcher`]. Evaluating it
//! scans its channel's log newest-first for the first event that passes
//! every gate, in order:
//!
//! 1. velocity is not 0 (note-off never matches)
//! 2. reference label equals the filter's reference, ignoring case
//!    (skipped when the reference is empty)
//! 3. MIDI number is in the allow-list (skipped when the list is empty)
//!
//! The scan is a pure function of the log and the spec. The dispatcher
//! decides whether the result is new enough to fire.

use std::collections::BTreeSet;
use std::sync::Arc;

use compact_str::CompactString;
use tracing::warn;

use crate::decoder::parse_leading_int;
use crate::dispatch::EdgeDispatcher;
use crate::effects::{EffectAggregator, EffectName, Firing};
use crate::event_log::EventLog;
use crate::events::{ChannelId, ControlEvent, ModuleId};

/// User-adjustable filter criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Reference as typed; `None` matches every label.
    reference: Option<CompactString>,
    /// Lowercased `reference`.
    reference_key: Option<CompactString>,
    /// Empty matches every MIDI number.
    notes: BTreeSet<i32>,
}

/// Result of parsing a comma-separated note list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteList {
    pub notes: BTreeSet<i32>,
    /// Tokens that did not start with an integer.
    pub rejected: Vec<String>,
}

/// Parse `"36, 38,40"` into an allow-list.
///
/// Tokens are trimmed. Empty tokens are skipped. Each token is read with
/// [`parse_leading_int`], so `"36abc"` means 36; tokens with no leading
/// digits are collected in [`NoteList::rejected`] while the rest still apply.
pub fn parse_note_list(text: &str) -> NoteList {
    let mut list = NoteList::default();
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match parse_leading_int(token) {
            Some(note) => {
                list.notes.insert(note);
            }
            None => list.rejected.push(token.to_string()),
        }
    }
    list
}

impl FilterSpec {
    /// A spec that matches every note-on event.
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.set_reference(reference);
        self
    }

    pub fn with_notes(mut self, notes: impl IntoIterator<Item = i32>) -> Self {
        self.set_notes(notes);
        self
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn notes(&self) -> &BTreeSet<i32> {
        &self.notes
    }

    /// Set the reference filter; an empty string clears it.
    pub fn set_reference(&mut self, reference: &str) {
        if reference.is_empty() {
            self.reference = None;
            self.reference_key = None;
        } else {
            self.reference = Some(CompactString::from(reference));
            self.reference_key = Some(CompactString::from(reference.to_lowercase()));
        }
    }

    /// Replace the note allow-list; an empty list clears it.
    pub fn set_notes(&mut self, notes: impl IntoIterator<Item = i32>) {
        self.notes = notes.into_iter().collect();
    }

    /// Replace the note allow-list from user text. Returns rejected tokens.
    pub fn set_notes_from_text(&mut self, text: &str) -> Vec<String> {
        let NoteList { notes, rejected } = parse_note_list(text);
        if !rejected.is_empty() {
            warn!(?rejected, "Ignoring non-numeric note allow-list entries");
        }
        self.notes = notes;
        rejected
    }

    /// Whether `event` passes every gate.
    pub fn matches(&self, event: &ControlEvent) -> bool {
        if event.is_note_off() {
            return false;
        }
        if let Some(reference) = &self.reference_key {
            if event.ref_key() != reference.as_str() {
                return false;
            }
        }
        self.notes.is_empty() || self.notes.contains(&event.midi_number())
    }
}

/// Newest event in `log` that passes `spec`.
pub fn find_latest(log: &EventLog, spec: &FilterSpec) -> Option<Arc<ControlEvent>> {
    log.iter_newest_first()
        .find(|event| spec.matches(event))
        .cloned()
}

/// One module bound to a channel.
pub struct FilterInstance {
    id: ModuleId,
    channel_id: ChannelId,
    spec: FilterSpec,
    dispatcher: EdgeDispatcher,
    effects: Arc<EffectAggregator>,
}

impl FilterInstance {
    pub fn new(
        channel_id: ChannelId,
        effect: EffectName,
        spec: FilterSpec,
        effects: Arc<EffectAggregator>,
    ) -> Self {
        Self {
            id: ModuleId::new(),
            channel_id,
            spec,
            dispatcher: EdgeDispatcher::new(effect),
            effects,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn spec_mut(&mut self) -> &mut FilterSpec {
        &mut self.spec
    }

    pub fn effect(&self) -> &EffectName {
        self.dispatcher.effect()
    }

    pub fn last_dispatched(&self) -> Option<&str> {
        self.dispatcher.last_dispatched()
    }

    /// Current match without touching dispatch state.
    pub fn current_match(&self, log: &EventLog) -> Option<Arc<ControlEvent>> {
        find_latest(log, &self.spec)
    }

    /// Re-evaluate against `log`, firing the effect if the match changed.
    pub fn evaluate(&mut self, log: &EventLog) -> Option<Firing> {
        let current = self.current_match(log);
        let dispatch = self.dispatcher.observe(current.as_deref())?;
        Some(self.effects.record(dispatch, self.channel_id, self.id))
    }
}
