//! Wall-clock driver for the simulated outputs.
//!
//! The monitor has no speakers, so something has to move the playheads and
//! report when an item runs out. `Playhead::advance` does both and hands
//! back the channel events for the session.

use std::time::Instant;

use sync2gear_playback::{AudioEvent, ChannelKind, PlaybackSnapshot, SimulatedHandle};

pub struct Playhead {
    music: SimulatedHandle,
    announcement: SimulatedHandle,
    last: Instant,
}

impl Playhead {
    pub fn new(music: SimulatedHandle, announcement: SimulatedHandle, now: Instant) -> Self {
        Self {
            music,
            announcement,
            last: now,
        }
    }

    /// Move both playheads to `now` and collect what happened meanwhile
    ///
    /// An item ends once the playing channel passes the duration the
    /// snapshot advertises for it.
    pub fn advance(&mut self, now: Instant, snapshot: Option<&PlaybackSnapshot>) -> Vec<AudioEvent> {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        self.music.advance(elapsed);
        self.announcement.advance(elapsed);

        let mut events = self.music.drain_events();
        events.extend(self.announcement.drain_events());

        if let Some((kind, item)) = snapshot.and_then(PlaybackSnapshot::audible) {
            let handle = self.handle(kind);
            let finished = item
                .duration_seconds
                .is_some_and(|duration| handle.position() >= duration);

            let current = handle.loaded().as_deref() == Some(item.source_url.as_str());

            if finished && current && handle.is_playing() {
                tracing::debug!("[{}] reached the end of {}", kind, item.title);
                events.extend(handle.finish());
            }
        }

        events
    }

    fn handle(&self, kind: ChannelKind) -> &SimulatedHandle {
        match kind {
            ChannelKind::Music => &self.music,
            ChannelKind::Announcement => &self.announcement,
        }
    }
}
