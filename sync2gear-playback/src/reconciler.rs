//! Dual-channel playback reconciler
//!
//! Translates each pushed `PlaybackSnapshot` into the minimal set of
//! load/seek/play/pause calls on the music and announcement channels.
//!
//! # Decision rules
//!
//! 1. Not playing: both channels pause. Loaded sources and the saved music
//!    position are kept.
//! 2. Announcement present: music that is audible has its position and
//!    source captured and is paused first, then the announcement is loaded
//!    (unless already loaded), positioned, and played. An announcement that
//!    is already loaded and playing only gets its volume updated.
//! 3. Track present: if the track is the one an announcement interrupted,
//!    music resumes at the position chosen by the `ResumePolicy` and the
//!    captured position is forgotten. Otherwise a track that is already
//!    loaded and playing only gets its volume updated, a loaded but stopped
//!    track is positioned and played without reloading, and a different
//!    track is loaded fresh. The announcement channel pauses.
//! 4. Neither present: both channels pause.
//!
//! # Serialization
//!
//! Starting a channel is asynchronous: `play` hands out an `OpTicket` and the
//! outcome comes back later as an `AudioEvent`. Each channel has one slot
//! for the start in flight and one for a parked start. A start requested
//! while another is in flight is parked (the latest replaces any earlier
//! one) and runs when the in-flight start completes. Pauses act at once and
//! drop the parked start; a start that completes after a pause is paused
//! again. Completions whose ticket does not match the slot are discarded.
//!
//! The ticket of the latest start also identifies the item it made audible.
//! An end or error reported under any other ticket belongs to an item that
//! has since been replaced and is discarded.

use sync2gear_stream::Generation;

use crate::channel::{AudioChannel, AudioEvent, ChannelError, ChannelKind, OpTicket};
use crate::model::{MediaItem, PlaybackSnapshot, ZoneId};
use crate::notice::Notice;
use crate::transport::TransportIntent;

/// Which position music resumes at after an announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// The snapshot's position when it is past zero, the captured one otherwise
    #[default]
    PreferBackend,
    /// Always the position captured when the announcement interrupted
    PreferCaptured,
}

impl ResumePolicy {
    pub fn resume_position(self, reported: f64, captured: f64) -> f64 {
        match self {
            ResumePolicy::PreferBackend if reported > 0.0 => reported,
            _ => captured,
        }
    }
}

/// Music channel bookkeeping that survives announcement interruptions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MusicBookkeeping {
    /// Source loaded on the music channel
    pub loaded_url: Option<String>,
    /// Source that was audible when an announcement interrupted it
    pub interrupted_url: Option<String>,
    /// Position captured at the interruption
    pub saved_position: Option<f64>,
}

impl MusicBookkeeping {
    fn forget_interruption(&mut self) {
        self.interrupted_url = None;
        self.saved_position = None;
    }
}

/// Everything the reconciler remembers about one zone selection
///
/// Created by `Reconciler::attach` and dropped by `Reconciler::detach`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerState {
    pub zone_id: ZoneId,
    pub generation: Generation,
    pub music: MusicBookkeeping,
    pub announcement_loaded_url: Option<String>,
}

impl ReconcilerState {
    fn new(zone_id: ZoneId, generation: Generation) -> Self {
        Self {
            zone_id,
            generation,
            music: MusicBookkeeping::default(),
            announcement_loaded_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    /// No zone is attached
    NoZone,
    /// The snapshot belongs to a zone other than the attached one
    ZoneMismatch { expected: ZoneId, received: ZoneId },
    /// The completion does not match the start in flight
    StaleCompletion,
    /// The end or error belongs to an item that has since been replaced
    ReplacedItem,
    /// The event belongs to an earlier zone selection
    StaleGeneration,
    /// Older than the last applied snapshot
    OutOfOrder,
    /// Same order key as the last applied snapshot
    Duplicate,
    /// The pushed state could not be understood
    Malformed(String),
}

/// Something the reconciler asks its owner to do
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Dispatch a transport request to the backend
    Request(TransportIntent),
    /// Surface a notice to the operator
    Notify(Notice),
    /// The input was ignored
    Discarded(DiscardReason),
}

#[derive(Debug, Clone, PartialEq)]
struct StartPlan {
    url: String,
    reload: bool,
    seek: Option<f64>,
    gain: f32,
}

struct Lane<C> {
    kind: ChannelKind,
    channel: C,
    loaded: Option<String>,
    /// Latest start begun on the channel
    current: Option<OpTicket>,
    in_flight: Option<OpTicket>,
    parked: Option<StartPlan>,
    repause: bool,
}

impl<C: AudioChannel> Lane<C> {
    fn new(kind: ChannelKind, channel: C) -> Self {
        Self {
            kind,
            channel,
            loaded: None,
            current: None,
            in_flight: None,
            parked: None,
            repause: false,
        }
    }

    /// True iff `ticket` started the item this lane is still meant to play
    fn owns(&self, ticket: OpTicket) -> bool {
        self.current == Some(ticket) && self.parked.is_none()
    }

    /// Audible now, or about to be
    fn is_active(&self) -> bool {
        self.channel.is_playing() || (self.in_flight.is_some() && !self.repause)
    }

    /// The source this lane will end up with
    fn target_url(&self) -> Option<&str> {
        self.parked
            .as_ref()
            .map(|plan| plan.url.as_str())
            .or(self.loaded.as_deref())
    }

    fn pause(&mut self) {
        self.channel.pause();
        self.parked = None;
        if self.in_flight.is_some() {
            self.repause = true;
        }
    }

    fn set_gain(&mut self, gain: f32) {
        self.channel.set_volume(gain);
        if let Some(plan) = self.parked.as_mut() {
            plan.gain = gain;
        }
    }

    /// Run the plan now, or park it behind the start in flight
    fn start(
        &mut self,
        plan: StartPlan,
        generation: Generation,
        next_seq: &mut u64,
    ) -> Result<(), ChannelError> {
        if self.in_flight.is_some() {
            tracing::debug!("[{}] start parked behind {:?}", self.kind, self.in_flight);
            self.parked = Some(plan);
            self.repause = false;
            return Ok(());
        }

        *next_seq += 1;
        let ticket = OpTicket {
            generation,
            channel: self.kind,
            seq: *next_seq,
        };

        self.current = None;
        match self.begin(&plan, ticket) {
            Ok(()) => {
                self.current = Some(ticket);
                self.in_flight = Some(ticket);
                self.repause = false;
                Ok(())
            }
            Err(error) => {
                self.loaded = None;
                Err(error)
            }
        }
    }

    fn begin(&mut self, plan: &StartPlan, ticket: OpTicket) -> Result<(), ChannelError> {
        if plan.reload {
            self.loaded = None;
            self.channel.load(&plan.url)?;
            self.loaded = Some(plan.url.clone());
        }
        if let Some(seconds) = plan.seek {
            self.channel.seek(seconds)?;
        }
        self.channel.set_volume(plan.gain);
        self.channel.play(ticket)
    }

    fn reset(&mut self) {
        self.channel.pause();
        self.loaded = None;
        self.current = None;
        self.in_flight = None;
        self.parked = None;
        self.repause = false;
    }
}

/// Owns both audio channels and keeps them consistent with the backend
pub struct Reconciler<M, A> {
    music: Lane<M>,
    announcement: Lane<A>,
    state: Option<ReconcilerState>,
    policy: ResumePolicy,
    next_seq: u64,
}

impl<M: AudioChannel, A: AudioChannel> Reconciler<M, A> {
    pub fn new(music: M, announcement: A) -> Self {
        Self {
            music: Lane::new(ChannelKind::Music, music),
            announcement: Lane::new(ChannelKind::Announcement, announcement),
            state: None,
            policy: ResumePolicy::default(),
            next_seq: 0,
        }
    }

    pub fn with_policy(mut self, policy: ResumePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ResumePolicy {
        self.policy
    }

    /// Start tracking a zone selection with fresh state
    ///
    /// Any previously attached state is detached first.
    pub fn attach(&mut self, zone_id: ZoneId, generation: Generation) {
        if self.state.is_some() {
            self.detach();
        }
        tracing::debug!("Reconciler attached to {} (generation {})", zone_id, generation);
        self.state = Some(ReconcilerState::new(zone_id, generation));
    }

    /// Pause both channels and drop the selection's state
    pub fn detach(&mut self) -> Option<ReconcilerState> {
        self.music.reset();
        self.announcement.reset();
        let state = self.state.take();
        if let Some(state) = &state {
            tracing::debug!("Reconciler detached from {}", state.zone_id);
        }
        state
    }

    pub fn state(&self) -> Option<&ReconcilerState> {
        self.state.as_ref()
    }

    pub fn zone_id(&self) -> Option<&ZoneId> {
        self.state.as_ref().map(|s| &s.zone_id)
    }

    pub fn generation(&self) -> Option<Generation> {
        self.state.as_ref().map(|s| s.generation)
    }

    /// True iff an announcement is the audible source
    pub fn is_announcement_channel_active(&self) -> bool {
        self.state.is_some() && self.announcement.is_active()
    }

    pub fn music(&self) -> &M {
        &self.music.channel
    }

    pub fn announcement(&self) -> &A {
        &self.announcement.channel
    }

    /// Bring both channels in line with `snapshot`
    pub fn apply(&mut self, snapshot: &PlaybackSnapshot) -> Vec<Effect> {
        let Some(mut state) = self.state.take() else {
            return vec![Effect::Discarded(DiscardReason::NoZone)];
        };

        let effects = if snapshot.zone_id != state.zone_id {
            tracing::debug!(
                "Discarded snapshot for {} while attached to {}",
                snapshot.zone_id,
                state.zone_id
            );
            vec![Effect::Discarded(DiscardReason::ZoneMismatch {
                expected: state.zone_id.clone(),
                received: snapshot.zone_id.clone(),
            })]
        } else {
            self.reconcile(&mut state, snapshot)
        };

        self.sync_loaded(&mut state);
        self.state = Some(state);
        effects
    }

    /// React to an asynchronous channel notification
    pub fn handle_event(&mut self, event: AudioEvent) -> Vec<Effect> {
        let Some(mut state) = self.state.take() else {
            if let AudioEvent::Started(ticket) = &event {
                self.silence_orphan(*ticket);
            }
            return vec![Effect::Discarded(DiscardReason::NoZone)];
        };

        let effects = self.dispatch_event(&mut state, event);
        self.sync_loaded(&mut state);
        self.state = Some(state);
        effects
    }

    fn sync_loaded(&self, state: &mut ReconcilerState) {
        state.music.loaded_url = self.music.loaded.clone();
        state.announcement_loaded_url = self.announcement.loaded.clone();
    }

    fn reconcile(&mut self, state: &mut ReconcilerState, snapshot: &PlaybackSnapshot) -> Vec<Effect> {
        let mut effects = Vec::new();

        if !snapshot.is_playing {
            self.music.pause();
            self.announcement.pause();
            return effects;
        }

        if let Some(announcement) = &snapshot.current_announcement {
            self.play_announcement(state, announcement, snapshot, &mut effects);
        } else if let Some(track) = &snapshot.current_track {
            self.play_track(state, track, snapshot, &mut effects);
        } else {
            self.music.pause();
            self.announcement.pause();
        }
        effects
    }

    fn play_announcement(
        &mut self,
        state: &mut ReconcilerState,
        announcement: &MediaItem,
        snapshot: &PlaybackSnapshot,
        effects: &mut Vec<Effect>,
    ) {
        if self.music.is_active() {
            let position = self.music.channel.position();
            tracing::debug!(
                "Announcement {} interrupts music at {:.1}s",
                announcement.id,
                position
            );
            state.music.saved_position = Some(position);
            state.music.interrupted_url = self.music.loaded.clone();
        }
        self.music.pause();

        let gain = snapshot.volume.gain();
        let url = &announcement.source_url;
        let loaded = self.announcement.target_url() == Some(url.as_str());

        if loaded && self.announcement.is_active() {
            self.announcement.set_gain(gain);
            return;
        }

        let plan = StartPlan {
            url: url.clone(),
            reload: !loaded,
            seek: Some(snapshot.position),
            gain,
        };
        let result = self.announcement.start(plan, state.generation, &mut self.next_seq);
        if let Err(error) = result {
            effects.push(channel_failure(ChannelKind::Announcement, &error));
        }
    }

    fn play_track(
        &mut self,
        state: &mut ReconcilerState,
        track: &MediaItem,
        snapshot: &PlaybackSnapshot,
        effects: &mut Vec<Effect>,
    ) {
        self.announcement.pause();

        let gain = snapshot.volume.gain();
        let url = &track.source_url;
        let loaded = self.music.target_url() == Some(url.as_str());
        let interrupted = state.music.interrupted_url.as_deref() == Some(url.as_str());

        let plan = match state.music.saved_position {
            Some(captured) if interrupted => {
                state.music.forget_interruption();
                let position = self.policy.resume_position(snapshot.position, captured);
                tracing::debug!("Resuming {} at {:.1}s", track.id, position);
                Some(StartPlan {
                    url: url.clone(),
                    reload: !loaded,
                    seek: Some(position),
                    gain,
                })
            }
            _ => {
                if state.music.interrupted_url.is_some() {
                    state.music.forget_interruption();
                }
                if loaded && self.music.is_active() {
                    None
                } else {
                    Some(StartPlan {
                        url: url.clone(),
                        reload: !loaded,
                        seek: Some(snapshot.position),
                        gain,
                    })
                }
            }
        };

        let Some(plan) = plan else {
            self.music.set_gain(gain);
            return;
        };

        let result = self.music.start(plan, state.generation, &mut self.next_seq);
        if let Err(error) = result {
            effects.push(channel_failure(ChannelKind::Music, &error));
        }
    }

    fn dispatch_event(&mut self, state: &mut ReconcilerState, event: AudioEvent) -> Vec<Effect> {
        match event {
            AudioEvent::Started(ticket) => {
                if ticket.generation != state.generation {
                    self.silence_orphan(ticket);
                    return vec![Effect::Discarded(DiscardReason::StaleGeneration)];
                }
                self.complete(state.generation, ticket, None)
            }
            AudioEvent::Failed { ticket, error } => {
                if ticket.generation != state.generation {
                    return vec![Effect::Discarded(DiscardReason::StaleGeneration)];
                }
                self.complete(state.generation, ticket, Some(error))
            }
            AudioEvent::Ended(ticket) => {
                if ticket.generation != state.generation {
                    return vec![Effect::Discarded(DiscardReason::StaleGeneration)];
                }
                if !self.owns(ticket) {
                    tracing::debug!("[{}] end of replaced item {:?}", ticket.channel, ticket);
                    return vec![Effect::Discarded(DiscardReason::ReplacedItem)];
                }
                // The backend decides what plays next; nothing resumes locally.
                let intent = match ticket.channel {
                    ChannelKind::Announcement => TransportIntent::Resume,
                    ChannelKind::Music => TransportIntent::Next,
                };
                tracing::debug!("{} ended, requesting {}", ticket.channel, intent);
                vec![Effect::Request(intent)]
            }
            AudioEvent::Error { ticket, error } => {
                if ticket.generation != state.generation {
                    return vec![Effect::Discarded(DiscardReason::StaleGeneration)];
                }
                if !self.owns(ticket) {
                    tracing::debug!("[{}] error of replaced item {:?}: {}", ticket.channel, ticket, error);
                    return vec![Effect::Discarded(DiscardReason::ReplacedItem)];
                }
                match ticket.channel {
                    ChannelKind::Music => self.music.reset(),
                    ChannelKind::Announcement => self.announcement.reset(),
                }
                vec![channel_failure(ticket.channel, &error)]
            }
        }
    }

    /// Settle the start identified by `ticket` and run any parked start
    fn complete(
        &mut self,
        generation: Generation,
        ticket: OpTicket,
        failure: Option<ChannelError>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        match ticket.channel {
            ChannelKind::Music => {
                settle(&mut self.music, generation, ticket, failure, &mut self.next_seq, &mut effects)
            }
            ChannelKind::Announcement => settle(
                &mut self.announcement,
                generation,
                ticket,
                failure,
                &mut self.next_seq,
                &mut effects,
            ),
        }
        effects
    }

    fn owns(&self, ticket: OpTicket) -> bool {
        match ticket.channel {
            ChannelKind::Music => self.music.owns(ticket),
            ChannelKind::Announcement => self.announcement.owns(ticket),
        }
    }

    /// Pause a channel whose start outlived its zone selection
    fn silence_orphan(&mut self, ticket: OpTicket) {
        tracing::debug!("Silencing {} start from generation {}", ticket.channel, ticket.generation);
        match ticket.channel {
            ChannelKind::Music if self.music.in_flight.is_none() => self.music.channel.pause(),
            ChannelKind::Announcement if self.announcement.in_flight.is_none() => {
                self.announcement.channel.pause()
            }
            _ => {}
        }
    }
}

fn settle<C: AudioChannel>(
    lane: &mut Lane<C>,
    generation: Generation,
    ticket: OpTicket,
    failure: Option<ChannelError>,
    next_seq: &mut u64,
    effects: &mut Vec<Effect>,
) {
    if lane.in_flight != Some(ticket) {
        tracing::debug!("[{}] stale completion {:?}", lane.kind, ticket);
        effects.push(Effect::Discarded(DiscardReason::StaleCompletion));
        return;
    }
    lane.in_flight = None;

    let mut parked = lane.parked.take();
    match failure {
        Some(error) => {
            lane.repause = false;
            lane.loaded = None;
            lane.current = None;
            effects.push(channel_failure(lane.kind, &error));
            // Nothing is known to be loaded after a failed start.
            if let Some(plan) = parked.as_mut() {
                plan.reload = true;
            }
        }
        None => {
            if lane.repause {
                lane.repause = false;
                lane.channel.pause();
            }
        }
    }

    if let Some(plan) = parked {
        if let Err(error) = lane.start(plan, generation, next_seq) {
            effects.push(channel_failure(lane.kind, &error));
        }
    }
}

fn channel_failure(kind: ChannelKind, error: &ChannelError) -> Effect {
    tracing::warn!("{} channel failed: {}", kind, error);
    Effect::Notify(Notice::channel_failure(kind, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{ChannelOp, SimulatedChannel, SimulatedHandle};

    const ZONE: &str = "2f1c9a4e-0000-4000-8000-000000000001";

    struct Rig {
        reconciler: Reconciler<SimulatedChannel, SimulatedChannel>,
        music: SimulatedHandle,
        announcement: SimulatedHandle,
    }

    fn zone() -> ZoneId {
        ZoneId::parse(ZONE).unwrap()
    }

    fn rig() -> Rig {
        let (music_channel, music) = SimulatedChannel::new(ChannelKind::Music);
        let (announcement_channel, announcement) = SimulatedChannel::new(ChannelKind::Announcement);
        let mut reconciler = Reconciler::new(music_channel, announcement_channel);
        reconciler.attach(zone(), 1);
        Rig {
            reconciler,
            music,
            announcement,
        }
    }

    fn track(url: &str, position: f64) -> PlaybackSnapshot {
        PlaybackSnapshot::playing_track(zone(), MediaItem::new(url, url), position)
    }

    fn announcement(url: &str, position: f64) -> PlaybackSnapshot {
        PlaybackSnapshot::playing_announcement(zone(), MediaItem::new(url, url), position)
    }

    #[test]
    fn test_start_parked_behind_in_flight_start() {
        let mut rig = rig();
        rig.reconciler.apply(&track("a.mp3", 0.0));
        let first = rig.music.pending_start().unwrap();

        // A different track arrives before the first start completes.
        rig.reconciler.apply(&track("c.mp3", 5.0));
        assert_eq!(rig.music.loaded().as_deref(), Some("a.mp3"));

        let started = rig.music.complete_start().unwrap();
        assert_eq!(started, AudioEvent::Started(first));
        assert!(rig.reconciler.handle_event(started).is_empty());

        assert_eq!(rig.music.loaded().as_deref(), Some("c.mp3"));
        assert_eq!(rig.music.position(), 5.0);
        assert_ne!(rig.music.pending_start(), Some(first));
    }

    #[test]
    fn test_pause_during_start_repauses() {
        let mut rig = rig();
        rig.reconciler.apply(&track("a.mp3", 0.0));
        rig.reconciler.apply(&PlaybackSnapshot::idle(zone()));

        let started = rig.music.complete_start().unwrap();
        rig.reconciler.handle_event(started);
        assert!(!rig.music.is_playing());
    }

    #[test]
    fn test_pause_drops_parked_start() {
        let mut rig = rig();
        rig.reconciler.apply(&track("a.mp3", 0.0));
        rig.reconciler.apply(&track("c.mp3", 0.0));
        rig.reconciler.apply(&PlaybackSnapshot::idle(zone()));

        let started = rig.music.complete_start().unwrap();
        rig.reconciler.handle_event(started);
        assert!(!rig.music.is_playing());
        assert_eq!(rig.music.loaded().as_deref(), Some("a.mp3"));
        assert!(rig.music.pending_start().is_none());
    }

    #[test]
    fn test_mismatched_completion_discarded() {
        let mut rig = rig();
        rig.reconciler.apply(&track("a.mp3", 0.0));
        let ticket = rig.music.pending_start().unwrap();

        let bogus = OpTicket { seq: ticket.seq + 10, ..ticket };
        assert_eq!(
            rig.reconciler.handle_event(AudioEvent::Started(bogus)),
            vec![Effect::Discarded(DiscardReason::StaleCompletion)]
        );
        assert_eq!(
            rig.reconciler.handle_event(AudioEvent::Started(OpTicket { generation: 0, ..ticket })),
            vec![Effect::Discarded(DiscardReason::StaleGeneration)]
        );
    }

    #[test]
    fn test_failed_start_notifies_and_forgets_source() {
        let mut rig = rig();
        rig.reconciler.apply(&track("a.mp3", 0.0));
        let failed = rig
            .music
            .fail_start(ChannelError::Decode("bad header".to_string()))
            .unwrap();

        let effects = rig.reconciler.handle_event(failed);
        assert!(matches!(&effects[..], [Effect::Notify(n)] if n.message.contains("bad header")));
        assert_eq!(rig.reconciler.state().unwrap().music.loaded_url, None);

        // The same snapshot again reloads.
        rig.music.clear_ops();
        rig.reconciler.apply(&track("a.mp3", 0.0));
        assert!(rig.music.ops().contains(&ChannelOp::Load("a.mp3".to_string())));
    }

    #[test]
    fn test_load_failure_leaves_other_channel_alone() {
        let mut rig = rig();
        rig.announcement.fail_loads_of("b.mp3");
        rig.reconciler.apply(&track("a.mp3", 10.0));
        let started = rig.music.complete_start().unwrap();
        rig.reconciler.handle_event(started);

        let effects = rig.reconciler.apply(&announcement("b.mp3", 0.0));
        assert!(matches!(&effects[..], [Effect::Notify(n)] if n.scope == crate::notice::NoticeScope::Announcement));

        let state = rig.reconciler.state().unwrap();
        assert_eq!(state.music.saved_position, Some(10.0));
        assert_eq!(state.music.loaded_url.as_deref(), Some("a.mp3"));
        assert_eq!(state.announcement_loaded_url, None);
    }

    /// Apply `snapshot` and complete the start it causes on `kind`
    fn play_through(rig: &mut Rig, snapshot: PlaybackSnapshot, kind: ChannelKind) {
        rig.reconciler.apply(&snapshot);
        let handle = match kind {
            ChannelKind::Music => &rig.music,
            ChannelKind::Announcement => &rig.announcement,
        };
        let started = handle.complete_start().unwrap();
        assert!(rig.reconciler.handle_event(started).is_empty());
    }

    #[test]
    fn test_ended_requests_backend_transition() {
        let mut rig = rig();
        play_through(&mut rig, announcement("b.mp3", 0.0), ChannelKind::Announcement);
        let ended = rig.announcement.finish().unwrap();
        assert_eq!(
            rig.reconciler.handle_event(ended),
            vec![Effect::Request(TransportIntent::Resume)]
        );

        play_through(&mut rig, track("a.mp3", 0.0), ChannelKind::Music);
        let ended = rig.music.finish().unwrap();
        assert_eq!(
            rig.reconciler.handle_event(ended),
            vec![Effect::Request(TransportIntent::Next)]
        );
    }

    #[test]
    fn test_end_of_replaced_track_discarded() {
        let mut rig = rig();
        play_through(&mut rig, track("a.mp3", 0.0), ChannelKind::Music);
        let late_end = rig.music.finish().unwrap();

        // The backend moved on to the next track before the end was handled.
        play_through(&mut rig, track("c.mp3", 0.0), ChannelKind::Music);
        assert_eq!(
            rig.reconciler.handle_event(late_end),
            vec![Effect::Discarded(DiscardReason::ReplacedItem)]
        );
        assert!(rig.music.is_playing());
        assert_eq!(rig.music.loaded().as_deref(), Some("c.mp3"));
    }

    #[test]
    fn test_end_while_replacement_starts_discarded() {
        let mut rig = rig();
        play_through(&mut rig, track("a.mp3", 0.0), ChannelKind::Music);
        let late_end = rig.music.finish().unwrap();

        rig.reconciler.apply(&track("c.mp3", 0.0));
        assert!(rig.music.pending_start().is_some());
        assert_eq!(
            rig.reconciler.handle_event(late_end),
            vec![Effect::Discarded(DiscardReason::ReplacedItem)]
        );
    }

    #[test]
    fn test_end_of_replaced_announcement_discarded() {
        let mut rig = rig();
        play_through(&mut rig, announcement("b.mp3", 0.0), ChannelKind::Announcement);
        let late_end = rig.announcement.finish().unwrap();

        play_through(&mut rig, announcement("d.mp3", 0.0), ChannelKind::Announcement);
        assert_eq!(
            rig.reconciler.handle_event(late_end),
            vec![Effect::Discarded(DiscardReason::ReplacedItem)]
        );
        assert!(rig.reconciler.is_announcement_channel_active());
    }

    #[test]
    fn test_error_of_replaced_item_keeps_new_source() {
        let mut rig = rig();
        play_through(&mut rig, track("a.mp3", 0.0), ChannelKind::Music);
        let late_error = rig
            .music
            .fail_playback(ChannelError::Network("connection reset".to_string()))
            .unwrap();

        play_through(&mut rig, track("c.mp3", 0.0), ChannelKind::Music);
        assert_eq!(
            rig.reconciler.handle_event(late_error),
            vec![Effect::Discarded(DiscardReason::ReplacedItem)]
        );
        assert_eq!(rig.reconciler.state().unwrap().music.loaded_url.as_deref(), Some("c.mp3"));
        assert!(rig.music.is_playing());
    }

    #[test]
    fn test_error_of_current_item_resets_lane() {
        let mut rig = rig();
        play_through(&mut rig, track("a.mp3", 0.0), ChannelKind::Music);
        let error = rig
            .music
            .fail_playback(ChannelError::Decode("corrupt frame".to_string()))
            .unwrap();

        let effects = rig.reconciler.handle_event(error);
        assert!(matches!(&effects[..], [Effect::Notify(n)] if n.message.contains("corrupt frame")));
        assert_eq!(rig.reconciler.state().unwrap().music.loaded_url, None);
    }

    #[test]
    fn test_detach_discards_everything() {
        let mut rig = rig();
        rig.reconciler.apply(&track("a.mp3", 0.0));
        let ticket = rig.music.pending_start().unwrap();

        let state = rig.reconciler.detach().unwrap();
        assert_eq!(state.zone_id, zone());
        assert_eq!(
            rig.reconciler.apply(&track("a.mp3", 0.0)),
            vec![Effect::Discarded(DiscardReason::NoZone)]
        );

        // The start completes after the selection is gone and is silenced.
        rig.music.complete_start();
        rig.reconciler.handle_event(AudioEvent::Started(ticket));
        assert!(!rig.music.is_playing());
    }

    #[test]
    fn test_snapshot_for_other_zone_discarded() {
        let mut rig = rig();
        let other = ZoneId::parse("2f1c9a4e-0000-4000-8000-000000000002").unwrap();
        let snapshot = PlaybackSnapshot::playing_track(other.clone(), MediaItem::new("t", "x.mp3"), 0.0);

        let effects = rig.reconciler.apply(&snapshot);
        assert_eq!(
            effects,
            vec![Effect::Discarded(DiscardReason::ZoneMismatch {
                expected: zone(),
                received: other
            })]
        );
        assert!(rig.music.ops().is_empty());
    }

    #[test]
    fn test_resume_policy() {
        assert_eq!(ResumePolicy::PreferBackend.resume_position(18.0, 10.0), 18.0);
        assert_eq!(ResumePolicy::PreferBackend.resume_position(0.0, 10.0), 10.0);
        assert_eq!(ResumePolicy::PreferCaptured.resume_position(18.0, 10.0), 10.0);
    }
}
