//! BroadcastHub processor.
//!
//! The hub owns every attached consumer channel. For each channel it keeps
//! the channel's [`EventLog`], its modules and the sender half of its egress
//! queue, all behind one per-channel lock. Publishing an event appends it to
//! every channel's log and then re-evaluates that channel's modules before
//! the lock is released, so no viewer ever sees a log the modules have not
//! looked at yet.
//!
//! Channels are delivered to independently: each has its own lock, log and
//! queue, and a full queue on one channel only drops messages for that
//! channel.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use compact_str::CompactString;
use kanau::processor::Processor;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::effects::{EffectAggregator, EffectName, Firing};
use crate::event_log::EventLog;
use crate::events::{
    ChannelId, ChannelMessage, ChannelReceiver, ChannelSender, ControlEvent, ModuleId,
    channel_egress,
};
use crate::filter::{FilterInstance, FilterSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("channel {0} is not attached")]
    UnknownChannel(ChannelId),
    #[error("module {module_id} does not exist on channel {channel_id}")]
    UnknownModule {
        channel_id: ChannelId,
        module_id: ModuleId,
    },
}

/// Receiving end of an attached channel.
#[derive(Debug)]
pub struct ConsumerChannel {
    id: ChannelId,
    rx: ChannelReceiver,
}

impl ConsumerChannel {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Wait for the next message. `None` once the channel is detached.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChannelMessage> {
        self.rx.try_recv().ok()
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// Channels whose log received the event.
    pub delivered: usize,
    /// Firings caused by the event, across all channels.
    pub firings: Vec<Firing>,
}

/// Point-in-time view of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSnapshot {
    pub id: ModuleId,
    pub channel_id: ChannelId,
    pub effect: EffectName,
    pub spec: FilterSpec,
    pub last_dispatched: Option<CompactString>,
}

impl ModuleSnapshot {
    fn of(module: &FilterInstance) -> Self {
        Self {
            id: module.id(),
            channel_id: module.channel_id(),
            effect: module.effect().clone(),
            spec: module.spec().clone(),
            last_dispatched: module.last_dispatched().map(CompactString::from),
        }
    }
}

/// Result of creating or reconfiguring a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleChange {
    pub module: ModuleSnapshot,
    /// Set when the re-evaluation after the change fired the effect.
    pub firing: Option<Firing>,
    /// Note allow-list tokens that were not integers.
    pub rejected_notes: Vec<String>,
}

struct ChannelState {
    log: EventLog,
    modules: Vec<FilterInstance>,
    egress: ChannelSender,
    /// Set under the lock by `detach`; later publishes skip the channel.
    detached: bool,
}

impl ChannelState {
    fn module(
        &self,
        channel_id: ChannelId,
        module_id: ModuleId,
    ) -> Result<&FilterInstance, HubError> {
        self.modules
            .iter()
            .find(|m| m.id() == module_id)
            .ok_or(HubError::UnknownModule {
                channel_id,
                module_id,
            })
    }
}

/// Fans decoded events out to every attached channel.
pub struct BroadcastHub {
    config: HubConfig,
    effects: Arc<EffectAggregator>,
    channels: RwLock<HashMap<ChannelId, Arc<Mutex<ChannelState>>>>,
    /// Held for a whole publish so every channel sees the same event order.
    publish_order: Mutex<()>,
    dropped_deliveries: AtomicU64,
}

impl BroadcastHub {
    pub fn new(config: HubConfig, effects: Arc<EffectAggregator>) -> Self {
        Self {
            config,
            effects,
            channels: RwLock::new(HashMap::new()),
            publish_order: Mutex::new(()),
            dropped_deliveries: AtomicU64::new(0),
        }
    }

    pub fn effects(&self) -> &Arc<EffectAggregator> {
        &self.effects
    }

    /// Messages dropped because an egress queue was full or closed.
    pub fn dropped_deliveries(&self) -> u64 {
        self.dropped_deliveries.load(Ordering::Relaxed)
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Attach a new channel with an empty log and no modules.
    ///
    /// The channel receives only events published after this returns.
    pub async fn attach(&self) -> ConsumerChannel {
        let id = ChannelId::new();
        let (egress, rx) = channel_egress(self.config.channel_buffer);
        let state = ChannelState {
            log: EventLog::new(self.config.retention),
            modules: Vec::new(),
            egress,
            detached: false,
        };
        self.channels
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(state)));
        info!(channel_id = %id, "Channel attached");
        ConsumerChannel { id, rx }
    }

    /// Detach a channel and release its log and modules.
    ///
    /// A publish that is already delivering to the channel finishes first;
    /// no publish starts delivering to it afterwards. Returns `false` if the
    /// channel was not attached.
    pub async fn detach(&self, id: ChannelId) -> bool {
        let Some(state) = self.channels.write().await.remove(&id) else {
            return false;
        };
        let mut state = state.lock().await;
        state.detached = true;
        state.log.clear();
        state.modules.clear();
        info!(channel_id = %id, "Channel detached");
        true
    }

    /// Deliver one event to every attached channel and evaluate their modules.
    pub async fn publish(&self, event: ControlEvent) -> PublishReport {
        let _order = self.publish_order.lock().await;
        let event = Arc::new(event);
        let channels: Vec<_> = self
            .channels
            .read()
            .await
            .iter()
            .map(|(id, state)| (*id, state.clone()))
            .collect();

        let mut report = PublishReport::default();
        for (channel_id, state) in channels {
            let mut guard = state.lock().await;
            if guard.detached {
                continue;
            }
            let state = &mut *guard;
            state.log.append(event.clone());
            report.delivered += 1;
            self.deliver(channel_id, &state.egress, ChannelMessage::Event(event.clone()));

            for module in state.modules.iter_mut() {
                if let Some(firing) = module.evaluate(&state.log) {
                    let message = ChannelMessage::Fired(firing.clone());
                    self.deliver(channel_id, &state.egress, message);
                    report.firings.push(firing);
                }
            }
        }

        debug!(
            address = event.address(),
            delivered = report.delivered,
            firings = report.firings.len(),
            "Event published"
        );
        report
    }

    /// Add a module to a channel and evaluate it against the current log.
    pub async fn add_module(
        &self,
        channel_id: ChannelId,
        effect: EffectName,
        spec: FilterSpec,
    ) -> Result<ModuleChange, HubError> {
        let mut guard = self.lock_channel(channel_id).await?;
        let state = &mut *guard;

        let mut module = FilterInstance::new(channel_id, effect, spec, self.effects.clone());
        let firing = module.evaluate(&state.log);
        if let Some(firing) = &firing {
            self.deliver(channel_id, &state.egress, ChannelMessage::Fired(firing.clone()));
        }
        let snapshot = ModuleSnapshot::of(&module);
        state.modules.push(module);

        info!(
            %channel_id,
            module_id = %snapshot.id,
            effect = %snapshot.effect,
            "Module added"
        );
        Ok(ModuleChange {
            module: snapshot,
            firing,
            rejected_notes: Vec::new(),
        })
    }

    pub async fn remove_module(
        &self,
        channel_id: ChannelId,
        module_id: ModuleId,
    ) -> Result<(), HubError> {
        let mut state = self.lock_channel(channel_id).await?;
        let before = state.modules.len();
        state.modules.retain(|m| m.id() != module_id);
        if state.modules.len() == before {
            return Err(HubError::UnknownModule {
                channel_id,
                module_id,
            });
        }
        info!(%channel_id, %module_id, "Module removed");
        Ok(())
    }

    /// Change a module's reference filter and re-evaluate it.
    pub async fn set_reference_filter(
        &self,
        channel_id: ChannelId,
        module_id: ModuleId,
        reference: &str,
    ) -> Result<ModuleChange, HubError> {
        self.reconfigure(channel_id, module_id, |spec| {
            spec.set_reference(reference);
            Vec::new()
        })
        .await
    }

    /// Replace a module's note allow-list from comma-separated text and
    /// re-evaluate it.
    pub async fn set_note_allow_list(
        &self,
        channel_id: ChannelId,
        module_id: ModuleId,
        text: &str,
    ) -> Result<ModuleChange, HubError> {
        self.reconfigure(channel_id, module_id, |spec| spec.set_notes_from_text(text))
            .await
    }

    /// Re-evaluate one module without any change. Fires only if the current
    /// match differs from the last dispatched one.
    pub async fn evaluate(
        &self,
        channel_id: ChannelId,
        module_id: ModuleId,
    ) -> Result<Option<Firing>, HubError> {
        let change = self.reconfigure(channel_id, module_id, |_| Vec::new()).await?;
        Ok(change.firing)
    }

    pub async fn module_snapshot(
        &self,
        channel_id: ChannelId,
        module_id: ModuleId,
    ) -> Result<ModuleSnapshot, HubError> {
        let state = self.lock_channel(channel_id).await?;
        let module = state.module(channel_id, module_id)?;
        Ok(ModuleSnapshot::of(module))
    }

    /// Snapshots of every module on a channel, in creation order.
    pub async fn modules(&self, channel_id: ChannelId) -> Result<Vec<ModuleSnapshot>, HubError> {
        let state = self.lock_channel(channel_id).await?;
        Ok(state.modules.iter().map(ModuleSnapshot::of).collect())
    }

    async fn reconfigure<F>(
        &self,
        channel_id: ChannelId,
        module_id: ModuleId,
        change: F,
    ) -> Result<ModuleChange, HubError>
    where
        F: FnOnce(&mut FilterSpec) -> Vec<String>,
    {
        let mut guard = self.lock_channel(channel_id).await?;
        let state = &mut *guard;
        let module = state
            .modules
            .iter_mut()
            .find(|m| m.id() == module_id)
            .ok_or(HubError::UnknownModule {
                channel_id,
                module_id,
            })?;

        let rejected_notes = change(module.spec_mut());
        let firing = module.evaluate(&state.log);
        let snapshot = ModuleSnapshot::of(module);
        if let Some(firing) = &firing {
            self.deliver(channel_id, &state.egress, ChannelMessage::Fired(firing.clone()));
        }
        Ok(ModuleChange {
            module: snapshot,
            firing,
            rejected_notes,
        })
    }

    async fn channel(&self, channel_id: ChannelId) -> Result<Arc<Mutex<ChannelState>>, HubError> {
        self.channels
            .read()
            .await
            .get(&channel_id)
            .cloned()
            .ok_or(HubError::UnknownChannel(channel_id))
    }

    /// Lock an attached channel's state.
    async fn lock_channel(
        &self,
        channel_id: ChannelId,
    ) -> Result<OwnedMutexGuard<ChannelState>, HubError> {
        Self::lock_attached(channel_id, self.channel(channel_id).await?).await
    }

    /// Lock `state`, failing if `detach` got to it first.
    async fn lock_attached(
        channel_id: ChannelId,
        state: Arc<Mutex<ChannelState>>,
    ) -> Result<OwnedMutexGuard<ChannelState>, HubError> {
        let guard = state.lock_owned().await;
        if guard.detached {
            return Err(HubError::UnknownChannel(channel_id));
        }
        Ok(guard)
    }

    fn deliver(&self, channel_id: ChannelId, egress: &ChannelSender, message: ChannelMessage) {
        match egress.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped_deliveries.fetch_add(1, Ordering::Relaxed);
                warn!(%channel_id, "Egress queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped_deliveries.fetch_add(1, Ordering::Relaxed);
                debug!(%channel_id, "Egress receiver gone, dropping message");
            }
        }
    }
}

impl Processor<ControlEvent> for BroadcastHub {
    type Output = PublishReport;
    type Error = Infallible;

    async fn process(&self, event: ControlEvent) -> Result<PublishReport, Infallible> {
        Ok(self.publish(event).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::event_log::Retention;

    fn ev(address: &str) -> ControlEvent {
        decode(address, Vec::new()).unwrap()
    }

    fn burst() -> EffectName {
        EffectName::new("Burst").unwrap()
    }

    fn hub_with(retention: Retention) -> BroadcastHub {
        let config = HubConfig {
            retention,
            ..HubConfig::default()
        };
        BroadcastHub::new(config, Arc::new(EffectAggregator::new()))
    }

    fn hub() -> BroadcastHub {
        hub_with(Retention::default())
    }

    fn drain(channel: &mut ConsumerChannel) -> Vec<ChannelMessage> {
        std::iter::from_fn(|| channel.try_recv()).collect()
    }

    #[tokio::test]
    async fn test_publish_with_no_channels_is_a_no_op() {
        let hub = hub();
        let report = hub.publish(ev("Note_1_A_40_5")).await;
        assert_eq!(report.delivered, 0);
        assert!(report.firings.is_empty());
    }

    #[tokio::test]
    async fn test_exactly_once_per_new_match() {
        let hub = hub();
        let channel = hub.attach().await;
        hub.add_module(channel.id(), burst(), FilterSpec::match_all())
            .await
            .unwrap();

        for address in ["Note_1_A_40_5", "Note_1_A_40_5", "Note_2_A_41_5"] {
            hub.publish(ev(address)).await;
        }
        assert_eq!(hub.effects().current_count(&burst()), 2);
    }

    #[tokio::test]
    async fn test_interleaved_matches_refire() {
        let hub = hub();
        let channel = hub.attach().await;
        hub.add_module(channel.id(), burst(), FilterSpec::match_all())
            .await
            .unwrap();

        for address in ["Note_1_A_40_5", "Note_1_A_41_5", "Note_1_A_40_5"] {
            hub.publish(ev(address)).await;
        }
        assert_eq!(hub.effects().current_count(&burst()), 3);
    }

    #[tokio::test]
    async fn test_note_off_does_not_fire() {
        let hub = hub();
        let channel = hub.attach().await;
        hub.add_module(channel.id(), burst(), FilterSpec::match_all())
            .await
            .unwrap();

        let report = hub.publish(ev("Note_1_A_40_0")).await;
        assert_eq!(report.delivered, 1);
        assert!(report.firings.is_empty());
    }

    #[tokio::test]
    async fn test_spec_change_resurfaces_only_new_matches() {
        let hub = hub();
        let channel = hub.attach().await;
        hub.publish(ev("Note_1_Alice_40_5")).await;
        hub.publish(ev("Note_1_Bob_41_5")).await;

        let added = hub
            .add_module(
                channel.id(),
                burst(),
                FilterSpec::match_all().with_reference("Bob"),
            )
            .await
            .unwrap();
        assert_eq!(added.firing.unwrap().address, "Note_1_Bob_41_5");
        let module_id = added.module.id;

        // Clearing the filter surfaces Bob again, which already fired.
        let cleared = hub
            .set_reference_filter(channel.id(), module_id, "")
            .await
            .unwrap();
        assert!(cleared.firing.is_none());

        let alice = hub
            .set_reference_filter(channel.id(), module_id, "Alice")
            .await
            .unwrap();
        assert_eq!(alice.firing.unwrap().address, "Note_1_Alice_40_5");
        assert_eq!(alice.module.spec.reference(), Some("Alice"));
        assert_eq!(hub.effects().current_count(&burst()), 2);
    }

    #[tokio::test]
    async fn test_note_allow_list_reports_rejected_tokens() {
        let hub = hub();
        let channel = hub.attach().await;
        hub.publish(ev("Note_1_A_36_5")).await;
        hub.publish(ev("Note_1_A_40_5")).await;
        let module_id = hub
            .add_module(channel.id(), burst(), FilterSpec::match_all())
            .await
            .unwrap()
            .module
            .id;

        let change = hub
            .set_note_allow_list(channel.id(), module_id, "36, kick")
            .await
            .unwrap();
        assert_eq!(change.rejected_notes, vec!["kick".to_string()]);
        let notes: Vec<i32> = change.module.spec.notes().iter().copied().collect();
        assert_eq!(notes, vec![36]);
        assert_eq!(change.firing.unwrap().address, "Note_1_A_36_5");
    }

    #[tokio::test]
    async fn test_evaluate_is_idempotent() {
        let hub = hub();
        let channel = hub.attach().await;
        hub.publish(ev("Note_1_A_40_5")).await;
        let module_id = hub
            .add_module(channel.id(), burst(), FilterSpec::match_all())
            .await
            .unwrap()
            .module
            .id;

        assert!(hub.evaluate(channel.id(), module_id).await.unwrap().is_none());
        assert!(hub.evaluate(channel.id(), module_id).await.unwrap().is_none());
        assert_eq!(hub.effects().current_count(&burst()), 1);
    }

    #[tokio::test]
    async fn test_fan_out_isolation() {
        let hub = hub();
        let mut alice_view = hub.attach().await;
        let mut bob_view = hub.attach().await;
        let alice_module = hub
            .add_module(
                alice_view.id(),
                burst(),
                FilterSpec::match_all().with_reference("alice"),
            )
            .await
            .unwrap()
            .module
            .id;
        hub.add_module(
            bob_view.id(),
            burst(),
            FilterSpec::match_all().with_reference("bob"),
        )
        .await
        .unwrap();

        let report = hub.publish(ev("Note_1_Alice_40_5")).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.firings.len(), 1);
        assert_eq!(report.firings[0].module_id, alice_module);

        let alice_msgs = drain(&mut alice_view);
        let bob_msgs = drain(&mut bob_view);
        assert!(matches!(
            alice_msgs.as_slice(),
            [ChannelMessage::Event(_), ChannelMessage::Fired(_)]
        ));
        assert!(matches!(bob_msgs.as_slice(), [ChannelMessage::Event(_)]));

        // Changing one channel's module leaves the other untouched.
        hub.set_reference_filter(alice_view.id(), alice_module, "")
            .await
            .unwrap();
        assert!(drain(&mut bob_view).is_empty());
    }

    #[tokio::test]
    async fn test_late_attach_sees_only_new_events() {
        let hub = hub();
        hub.publish(ev("Note_1_A_40_5")).await;
        let channel = hub.attach().await;
        let change = hub
            .add_module(channel.id(), burst(), FilterSpec::match_all())
            .await
            .unwrap();
        assert!(change.firing.is_none());
        assert_eq!(change.module.last_dispatched, None);
    }

    #[tokio::test]
    async fn test_detach_stops_delivery() {
        let hub = hub();
        let mut channel = hub.attach().await;
        let id = channel.id();
        hub.add_module(id, burst(), FilterSpec::match_all()).await.unwrap();

        assert!(hub.detach(id).await);
        assert!(!hub.detach(id).await);
        assert_eq!(hub.channel_count().await, 0);

        let report = hub.publish(ev("Note_1_A_40_5")).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(hub.effects().current_count(&burst()), 0);
        assert!(channel.recv().await.is_none());
        assert_eq!(
            hub.modules(id).await.unwrap_err(),
            HubError::UnknownChannel(id)
        );
    }

    #[tokio::test]
    async fn test_unknown_module_is_an_error() {
        let hub = hub();
        let channel = hub.attach().await;
        let missing = ModuleId::new();
        assert_eq!(
            hub.remove_module(channel.id(), missing).await.unwrap_err(),
            HubError::UnknownModule {
                channel_id: channel.id(),
                module_id: missing,
            }
        );
        assert!(hub.module_snapshot(channel.id(), missing).await.is_err());
    }

    #[tokio::test]
    async fn test_removed_module_stops_firing() {
        let hub = hub();
        let channel = hub.attach().await;
        let module_id = hub
            .add_module(channel.id(), burst(), FilterSpec::match_all())
            .await
            .unwrap()
            .module
            .id;
        hub.remove_module(channel.id(), module_id).await.unwrap();

        let report = hub.publish(ev("Note_1_A_40_5")).await;
        assert!(report.firings.is_empty());
        assert!(hub.modules(channel.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let config = HubConfig {
            channel_buffer: 1,
            ..HubConfig::default()
        };
        let hub = BroadcastHub::new(config, Arc::new(EffectAggregator::new()));
        let mut channel = hub.attach().await;

        hub.publish(ev("Note_1_A_40_5")).await;
        let report = hub.publish(ev("Note_1_A_41_5")).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(hub.dropped_deliveries(), 1);
        assert_eq!(drain(&mut channel).len(), 1);
    }

    #[tokio::test]
    async fn test_retention_policies_agree_on_firings() {
        let script = [
            "Note_1_Alice_40_5",
            "Note_1_Bob_41_5",
            "Note_1_Alice_40_0",
            "Note_2_alice_40_5",
            "Note_1_Bob_41_5",
            "Note_1_Carol_42_5",
        ];

        let mut results = Vec::new();
        for retention in [Retention::Unbounded, Retention::LatestPerKey { max_keys: 8 }] {
            let hub = hub_with(retention);
            let channel = hub.attach().await;
            let module_id = hub
                .add_module(channel.id(), burst(), FilterSpec::match_all())
                .await
                .unwrap()
                .module
                .id;

            let mut fired = Vec::new();
            for address in script {
                let report = hub.publish(ev(address)).await;
                fired.extend(report.firings.into_iter().map(|f| f.address.to_string()));
            }
            for reference in ["alice", "bob", ""] {
                let change = hub
                    .set_reference_filter(channel.id(), module_id, reference)
                    .await
                    .unwrap();
                fired.extend(change.firing.map(|f| f.address.to_string()));
            }
            results.push(fired);
        }
        assert_eq!(results[0], results[1]);
    }

    #[tokio::test]
    async fn test_module_calls_racing_detach_see_unknown_channel() {
        let hub = hub();
        let channel = hub.attach().await;
        let id = channel.id();
        let module_id = hub
            .add_module(id, burst(), FilterSpec::match_all())
            .await
            .unwrap()
            .module
            .id;

        // A caller that looked the channel up before detach and locks after it.
        let state = hub.channel(id).await.unwrap();
        assert!(hub.detach(id).await);
        assert!(matches!(
            BroadcastHub::lock_attached(id, state).await,
            Err(HubError::UnknownChannel(channel_id)) if channel_id == id
        ));

        assert_eq!(
            hub.remove_module(id, module_id).await.unwrap_err(),
            HubError::UnknownChannel(id)
        );
        assert_eq!(
            hub.set_reference_filter(id, module_id, "a").await.unwrap_err(),
            HubError::UnknownChannel(id)
        );
        assert_eq!(
            hub.module_snapshot(id, module_id).await.unwrap_err(),
            HubError::UnknownChannel(id)
        );
    }

    /// Event addresses in arrival order, checking that every `fired` follows
    /// the event that caused it.
    fn event_sequence(messages: &[ChannelMessage]) -> Vec<String> {
        let mut events = Vec::new();
        for message in messages {
            match message {
                ChannelMessage::Event(event) => events.push(event.address().to_string()),
                ChannelMessage::Fired(firing) => {
                    assert_eq!(events.last().map(String::as_str), Some(firing.address.as_str()));
                }
            }
        }
        events
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_and_detach() {
        const PUBLISHERS: usize = 4;
        const EVENTS: usize = 200;

        let config = HubConfig {
            channel_buffer: 4 * PUBLISHERS * EVENTS,
            ..HubConfig::default()
        };
        let hub = Arc::new(BroadcastHub::new(config, Arc::new(EffectAggregator::new())));
        let mut first = hub.attach().await;
        let mut second = hub.attach().await;
        let mut leaving = hub.attach().await;
        for channel in [&first, &second] {
            hub.add_module(channel.id(), burst(), FilterSpec::match_all())
                .await
                .unwrap();
        }

        let publishers: Vec<_> = (0..PUBLISHERS)
            .map(|p| {
                let hub = hub.clone();
                tokio::spawn(async move {
                    for i in 0..EVENTS {
                        hub.publish(ev(&format!("/Note_{i}_P{p}_{}_5", i % 128))).await;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        assert!(hub.detach(leaving.id()).await);
        let before_detach: Vec<_> = std::iter::from_fn(|| leaving.try_recv()).collect();

        for publisher in publishers {
            publisher.await.unwrap();
        }

        // Nothing reaches the detached channel once detach has returned.
        assert!(leaving.try_recv().is_none());
        assert!(leaving.recv().await.is_none());

        let first_events = event_sequence(&drain(&mut first));
        let second_events = event_sequence(&drain(&mut second));
        assert_eq!(first_events.len(), PUBLISHERS * EVENTS);
        assert_eq!(first_events, second_events);

        let leaving_events = event_sequence(&before_detach);
        assert_eq!(leaving_events, first_events[..leaving_events.len()]);
        assert_eq!(hub.dropped_deliveries(), 0);
    }

    #[tokio::test]
    async fn test_processor_publishes() {
        let hub = hub();
        let channel = hub.attach().await;
        hub.add_module(channel.id(), burst(), FilterSpec::match_all())
            .await
            .unwrap();
        let report = hub.process(ev("Note_1_A_40_5")).await.unwrap();
        assert_eq!(report.firings.len(), 1);
    }
}
