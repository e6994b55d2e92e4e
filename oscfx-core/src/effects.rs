//! Effect aggregator.
//!
//! Process-wide counters, one per effect name, bumped on every firing of
//! any module. The aggregator is created with the pipeline and handed to
//! the hub (and through it to every module) as an `Arc`; nothing reaches it
//! through global state.
//!
//! Consumers either poll [`EffectAggregator::current_count`] or subscribe
//! with [`EffectAggregator::on_fire`]. Subscriptions use unbounded queues,
//! so a subscriber sees every firing for its effect exactly once and in
//! counter order.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use compact_str::CompactString;
use oscfx_sdk::objects::FiringRecord;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::dispatch::Dispatch;
use crate::events::{ChannelId, ModuleId};

/// Stream of firings returned by the subscribe methods.
pub type FiringStream = UnboundedReceiverStream<Firing>;

/// The effect name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectNameError {
    #[error("effect name must not be empty")]
    Empty,
}

/// Name of an effect, e.g. `"Burst"` or `"Light Up"`.
///
/// The set of effects is open; any non-empty name is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectName(CompactString);

impl EffectName {
    pub fn new(name: impl AsRef<str>) -> Result<Self, EffectNameError> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(EffectNameError::Empty);
        }
        Ok(Self(CompactString::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for EffectName {
    type Err = EffectNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for EffectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One recorded firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub effect: EffectName,
    /// Counter value for `effect` after this firing.
    pub count: u64,
    /// Address of the event that caused the firing.
    pub address: CompactString,
    pub channel_id: ChannelId,
    pub module_id: ModuleId,
    pub fired_at: OffsetDateTime,
}

impl Firing {
    pub fn to_record(&self) -> FiringRecord {
        FiringRecord {
            effect: self.effect.to_string(),
            count: self.count,
            address: self.address.to_string(),
            channel_id: self.channel_id.as_uuid(),
            module_id: self.module_id.as_uuid(),
            fired_at_ms: (self.fired_at.unix_timestamp_nanos() / 1_000_000) as i64,
        }
    }
}

struct Subscriber {
    /// `None` subscribes to every effect.
    effect: Option<EffectName>,
    tx: mpsc::UnboundedSender<Firing>,
}

#[derive(Default)]
struct AggregatorInner {
    counters: HashMap<EffectName, u64>,
    subscribers: Vec<Subscriber>,
}

/// Shared effect counters plus firing notifications.
#[derive(Default)]
pub struct EffectAggregator {
    inner: Mutex<AggregatorInner>,
}

impl EffectAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorInner> {
        // A poisoned lock still holds valid counters.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a dispatch and notify subscribers.
    ///
    /// Increment and notification happen under one lock, so subscribers
    /// observe counts in strictly increasing order.
    pub fn record(&self, dispatch: Dispatch, channel_id: ChannelId, module_id: ModuleId) -> Firing {
        let mut inner = self.lock();

        let counter = inner.counters.entry(dispatch.effect.clone()).or_insert(0);
        *counter += 1;
        let firing = Firing {
            count: *counter,
            effect: dispatch.effect,
            address: dispatch.address,
            channel_id,
            module_id,
            fired_at: dispatch.at,
        };

        inner.subscribers.retain(|sub| {
            if sub.effect.as_ref().is_some_and(|e| *e != firing.effect) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(firing.clone()).is_ok()
        });

        debug!(
            effect = %firing.effect,
            count = firing.count,
            address = %firing.address,
            %channel_id,
            %module_id,
            "Effect fired"
        );
        firing
    }

    /// Current counter value; 0 for effects that never fired.
    pub fn current_count(&self, effect: &EffectName) -> u64 {
        self.lock().counters.get(effect).copied().unwrap_or(0)
    }

    /// All counters, sorted by effect name.
    pub fn counts(&self) -> Vec<(EffectName, u64)> {
        let mut counts: Vec<_> = self
            .lock()
            .counters
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        counts.sort();
        counts
    }

    /// Subscribe to firings of one effect.
    pub fn on_fire(&self, effect: EffectName) -> FiringStream {
        self.subscribe(Some(effect))
    }

    /// Subscribe to firings of every effect.
    pub fn on_any_fire(&self) -> FiringStream {
        self.subscribe(None)
    }

    fn subscribe(&self, effect: Option<EffectName>) -> FiringStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(Subscriber { effect, tx });
        UnboundedReceiverStream::new(rx)
    }

    /// Number of live subscriptions (closed ones are pruned on the next firing).
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}
