//! Playback session
//!
//! `PlaybackSession` is the single owner of everything that reacts to the
//! selected zone: the reconciler and its channels, the snapshot store, the
//! transport dispatcher, feed health and the notice sink. It runs on one
//! thread; the feed subscriber and the transport worker only talk to it
//! through the events the caller hands in.
//!
//! A typical loop:
//!
//! ```rust,ignore
//! let generation = session.select_zone(zone.clone());
//! subscriber.select_zone_as(zone.as_str(), token, generation)?;
//!
//! loop {
//!     if let Some(event) = subscriber.iter().recv_timeout(TICK) {
//!         session.handle_feed_event(event);
//!     }
//!     for event in audio_events() {
//!         session.handle_audio_event(event);
//!     }
//!     session.poll_transport();
//!     session.tick(Instant::now());
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use sync2gear_stream::{FeedEvent, FeedEventKind, Generation};

use crate::channel::{AudioChannel, AudioEvent};
use crate::error::{PlaybackError, Result};
use crate::health::{FeedHealth, HealthTransition};
use crate::model::{PlaybackSnapshot, ZoneId};
use crate::notice::{Notice, NoticeScope, NoticeSink};
use crate::reconciler::{DiscardReason, Effect, Reconciler, ResumePolicy};
use crate::store::{ApplyOutcome, SnapshotStore};
use crate::transport::{TransportDispatcher, TransportIntent, TransportOutcome};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time without a snapshot after which the feed counts as stale
    pub stale_after: Duration,
    pub resume_policy: ResumePolicy,
}

impl SessionConfig {
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.stale_after.is_zero() {
            return Err(PlaybackError::Configuration(
                "stale_after must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_after: FeedHealth::DEFAULT_STALE_AFTER,
            resume_policy: ResumePolicy::default(),
        }
    }
}

pub struct PlaybackSession<M, A, S> {
    reconciler: Reconciler<M, A>,
    store: Arc<SnapshotStore>,
    transport: TransportDispatcher,
    notices: S,
    health: FeedHealth,
    zone: Option<ZoneId>,
    generation: Generation,
}

impl<M, A, S> PlaybackSession<M, A, S>
where
    M: AudioChannel,
    A: AudioChannel,
    S: NoticeSink,
{
    pub fn new(music: M, announcement: A, transport: TransportDispatcher, notices: S) -> Self {
        Self::with_config(music, announcement, transport, notices, SessionConfig::default())
    }

    pub fn with_config(
        music: M,
        announcement: A,
        transport: TransportDispatcher,
        notices: S,
        config: SessionConfig,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(music, announcement).with_policy(config.resume_policy),
            store: Arc::new(SnapshotStore::new()),
            transport,
            notices,
            health: FeedHealth::new(config.stale_after),
            zone: None,
            generation: 0,
        }
    }

    /// Switch to `zone` and return the generation for its feed subscription
    ///
    /// Both channels are paused and all state of the previous selection is
    /// dropped. Events tagged with an older generation are ignored from now on.
    pub fn select_zone(&mut self, zone: ZoneId) -> Generation {
        self.reconciler.detach();
        if let Some(previous) = self.zone.take() {
            self.store.unwatch(&previous);
            self.store.remove_zone(&previous);
        }
        self.store.remove_zone(&zone);

        self.generation += 1;
        self.reconciler.attach(zone.clone(), self.generation);
        self.health.reset(Instant::now());
        tracing::info!("Selected zone {} (generation {})", zone, self.generation);

        self.zone = Some(zone);
        self.generation
    }

    pub fn handle_feed_event(&mut self, event: FeedEvent) -> Vec<Effect> {
        let Some(zone) = self.zone.clone() else {
            return vec![Effect::Discarded(DiscardReason::NoZone)];
        };
        if event.generation != self.generation {
            tracing::trace!(
                "Dropping feed event of generation {} (current {})",
                event.generation,
                self.generation
            );
            return vec![Effect::Discarded(DiscardReason::StaleGeneration)];
        }
        if let Some(reason) = zone_mismatch(&zone, &event.zone_id) {
            return vec![Effect::Discarded(reason)];
        }

        match event.kind {
            FeedEventKind::Status(status) => {
                self.store.set_status(&zone, status);
                let effects = self
                    .health
                    .record_status(status)
                    .map(|t| vec![Effect::Notify(t.notice(self.health.stale_after()))])
                    .unwrap_or_default();
                self.perform(effects)
            }
            FeedEventKind::Error(message) => {
                tracing::warn!("Feed for {}: {}", zone, message);
                Vec::new()
            }
            FeedEventKind::Snapshot(wire) => match PlaybackSnapshot::try_from(wire) {
                Ok(snapshot) => self.apply_snapshot(&zone, snapshot),
                Err(e) => {
                    tracing::warn!("Ignoring snapshot for {}: {}", zone, e);
                    vec![Effect::Discarded(DiscardReason::Malformed(e.to_string()))]
                }
            },
        }
    }

    fn apply_snapshot(&mut self, zone: &ZoneId, snapshot: PlaybackSnapshot) -> Vec<Effect> {
        if &snapshot.zone_id != zone {
            return vec![Effect::Discarded(DiscardReason::ZoneMismatch {
                expected: zone.clone(),
                received: snapshot.zone_id,
            })];
        }

        match self.store.apply(snapshot.clone()) {
            ApplyOutcome::Applied => {}
            ApplyOutcome::Stale => return vec![Effect::Discarded(DiscardReason::OutOfOrder)],
            ApplyOutcome::Duplicate => return vec![Effect::Discarded(DiscardReason::Duplicate)],
        }

        let mut effects = Vec::new();
        if let Some(transition) = self.health.record_snapshot(Instant::now()) {
            effects.push(Effect::Notify(transition.notice(self.health.stale_after())));
        }
        effects.extend(self.reconciler.apply(&snapshot));
        self.perform(effects)
    }

    /// Forward an audio channel notification to the reconciler
    pub fn handle_audio_event(&mut self, event: AudioEvent) -> Vec<Effect> {
        let effects = self.reconciler.handle_event(event);
        self.perform(effects)
    }

    /// Send an operator intent to the backend for the selected zone
    ///
    /// The outcome arrives later through `poll_transport`.
    pub fn request(&mut self, intent: TransportIntent) -> Result<()> {
        let zone = self.zone.clone().ok_or(PlaybackError::NoZoneSelected)?;
        intent.validate()?;
        self.transport.dispatch(zone, intent)?;
        Ok(())
    }

    /// Handle every transport outcome that has arrived
    pub fn poll_transport(&mut self) -> Vec<Notice> {
        self.transport
            .drain_outcomes()
            .into_iter()
            .filter_map(|outcome| self.handle_transport_outcome(outcome))
            .collect()
    }

    /// Turn a failed request into a notice; success changes nothing locally
    pub fn handle_transport_outcome(&mut self, outcome: TransportOutcome) -> Option<Notice> {
        let error = outcome.result.err()?;
        let notice = Notice::error(
            NoticeScope::Transport,
            format!("Could not {}: {}", outcome.intent, error),
        );
        self.notices.notify(notice.clone());
        Some(notice)
    }

    /// Check feed staleness
    pub fn tick(&mut self, now: Instant) -> Option<HealthTransition> {
        self.zone.as_ref()?;
        let transition = self.health.check(now)?;
        tracing::warn!("Feed for generation {} is stale", self.generation);
        self.notices
            .notify(transition.notice(self.health.stale_after()));
        Some(transition)
    }

    /// Pause everything and forget the selection
    pub fn teardown(&mut self) {
        self.reconciler.detach();
        if let Some(zone) = self.zone.take() {
            self.store.unwatch(&zone);
            tracing::info!("Left zone {}", zone);
        }
    }

    pub fn zone(&self) -> Option<&ZoneId> {
        self.zone.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler<M, A> {
        &self.reconciler
    }

    pub fn health(&self) -> &FeedHealth {
        &self.health
    }

    pub fn notices(&self) -> &S {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut S {
        &mut self.notices
    }

    /// Carry out effects and return them
    fn perform(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        for effect in &effects {
            match effect {
                Effect::Request(intent) => {
                    if let Err(e) = self.request(intent.clone()) {
                        self.notices.notify(Notice::error(
                            NoticeScope::Transport,
                            format!("Could not {}: {}", intent, e),
                        ));
                    }
                }
                Effect::Notify(notice) => self.notices.notify(notice.clone()),
                Effect::Discarded(reason) => tracing::trace!("Discarded: {:?}", reason),
            }
        }
        effects
    }
}

fn zone_mismatch(expected: &ZoneId, received: &str) -> Option<DiscardReason> {
    match ZoneId::parse(received) {
        Ok(id) if &id == expected => None,
        Ok(id) => Some(DiscardReason::ZoneMismatch {
            expected: expected.clone(),
            received: id,
        }),
        Err(e) => Some(DiscardReason::Malformed(e.to_string())),
    }
}
