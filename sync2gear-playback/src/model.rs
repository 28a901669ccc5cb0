//! Validated playback model
//!
//! `PlaybackSnapshot` is the backend's authoritative description of a zone at
//! one instant. It is immutable once received and superseded entirely by the
//! next one.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sync2gear_api::{WireMedia, WireSnapshot};
use uuid::Uuid;

use crate::channel::ChannelKind;
use crate::error::{PlaybackError, Result};

/// A zone identifier, always a lowercase hyphenated UUID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn parse(value: &str) -> Result<Self> {
        Uuid::parse_str(value.trim())
            .map(|uuid| ZoneId(uuid.hyphenated().to_string()))
            .map_err(|_| PlaybackError::InvalidZone(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ZoneId {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        ZoneId::parse(s)
    }
}

/// Zone output volume on the 0-100 operator scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: u8 = 100;

    /// Clamps to 0-100
    pub fn new(value: u8) -> Self {
        Volume(value.min(Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Gain on the 0.0-1.0 scale audio outputs use
    pub fn gain(self) -> f32 {
        f32::from(self.0) / f32::from(Self::MAX)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume(sync2gear_api::DEFAULT_VOLUME)
    }
}

/// A playable item: a music track or an announcement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub duration_seconds: Option<f64>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            source_url: source_url.into(),
            duration_seconds: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    fn from_wire(media: WireMedia, role: &str) -> Result<Self> {
        let source_url = media
            .file_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                PlaybackError::InvalidSnapshot(format!("{} {} has no file_url", role, media.id))
            })?;

        Ok(Self {
            title: media.title.unwrap_or_else(|| media.id.clone()),
            id: media.id,
            source_url,
            duration_seconds: media.duration.filter(|d| d.is_finite() && *d >= 0.0),
        })
    }
}

/// Ordering key of a snapshot
///
/// Backends that number their pushes send `sequence`; otherwise the
/// `last_updated` timestamp orders them. Snapshots with neither cannot be
/// ordered and are always applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SnapshotOrder {
    Sequence(u64),
    Timestamp(DateTime<Utc>),
    Unordered,
}

impl SnapshotOrder {
    /// Compare with the key of the last applied snapshot
    ///
    /// `None` means the two keys are not comparable.
    pub fn compare(&self, last: &SnapshotOrder) -> Option<Ordering> {
        match (self, last) {
            (SnapshotOrder::Sequence(a), SnapshotOrder::Sequence(b)) => Some(a.cmp(b)),
            (SnapshotOrder::Timestamp(a), SnapshotOrder::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// One authoritative description of a zone's playback
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub zone_id: ZoneId,
    pub is_playing: bool,
    /// Seconds into whichever item is current
    pub position: f64,
    pub volume: Volume,
    pub queue_position: usize,
    pub current_track: Option<MediaItem>,
    pub current_announcement: Option<MediaItem>,
    pub order: SnapshotOrder,
}

impl PlaybackSnapshot {
    /// An idle snapshot for `zone_id`
    pub fn idle(zone_id: ZoneId) -> Self {
        Self {
            zone_id,
            is_playing: false,
            position: 0.0,
            volume: Volume::default(),
            queue_position: 0,
            current_track: None,
            current_announcement: None,
            order: SnapshotOrder::Unordered,
        }
    }

    /// A playing snapshot with `track` current
    pub fn playing_track(zone_id: ZoneId, track: MediaItem, position: f64) -> Self {
        Self {
            is_playing: true,
            position,
            current_track: Some(track),
            ..Self::idle(zone_id)
        }
    }

    /// A playing snapshot with `announcement` interrupting the music
    pub fn playing_announcement(zone_id: ZoneId, announcement: MediaItem, position: f64) -> Self {
        Self {
            is_playing: true,
            position,
            current_announcement: Some(announcement),
            ..Self::idle(zone_id)
        }
    }

    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Volume::new(volume);
        self
    }

    pub fn with_order(mut self, order: SnapshotOrder) -> Self {
        self.order = order;
        self
    }

    /// The item that should be heard; an announcement always wins over a track
    pub fn audible(&self) -> Option<(ChannelKind, &MediaItem)> {
        if !self.is_playing {
            return None;
        }
        self.current_announcement
            .as_ref()
            .map(|a| (ChannelKind::Announcement, a))
            .or_else(|| self.current_track.as_ref().map(|t| (ChannelKind::Music, t)))
    }
}

impl TryFrom<WireSnapshot> for PlaybackSnapshot {
    type Error = PlaybackError;

    fn try_from(wire: WireSnapshot) -> Result<Self> {
        let zone_id = ZoneId::parse(&wire.zone_id)?;

        let order = match (wire.sequence, wire.last_updated) {
            (Some(sequence), _) => SnapshotOrder::Sequence(sequence),
            (None, Some(timestamp)) => SnapshotOrder::Timestamp(timestamp),
            (None, None) => SnapshotOrder::Unordered,
        };

        Ok(Self {
            zone_id,
            is_playing: wire.is_playing,
            position: if wire.position.is_finite() { wire.position.max(0.0) } else { 0.0 },
            volume: Volume::new(wire.volume),
            queue_position: wire.queue_position,
            current_track: wire
                .current_track_data
                .map(|m| MediaItem::from_wire(m, "track"))
                .transpose()?,
            current_announcement: wire
                .current_announcement_data
                .map(|m| MediaItem::from_wire(m, "announcement"))
                .transpose()?,
            order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONE: &str = "2F1C9A4E-0000-4000-8000-000000000001";

    fn wire() -> WireSnapshot {
        serde_json::from_value(serde_json::json!({
            "zone_id": ZONE,
            "is_playing": true,
            "position": 10,
            "volume": 80,
            "current_track_data": {"id": "t1", "file_url": "a.mp3", "duration": 180},
            "current_announcement_data": {"id": "an1", "title": "Closing", "file_url": "b.mp3"},
            "last_updated": "2025-03-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_zone_id_normalized() {
        let zone = ZoneId::parse(ZONE).unwrap();
        assert_eq!(zone.as_str(), "2f1c9a4e-0000-4000-8000-000000000001");
        assert!(ZoneId::parse("all-zones").is_err());
        assert!("lobby".parse::<ZoneId>().is_err());
    }

    #[test]
    fn test_volume_scale() {
        assert_eq!(Volume::new(250).value(), 100);
        assert_eq!(Volume::new(50).gain(), 0.5);
        assert_eq!(Volume::new(0).gain(), 0.0);
        assert_eq!(Volume::default().value(), 70);
    }

    #[test]
    fn test_from_wire() {
        let snapshot = PlaybackSnapshot::try_from(wire()).unwrap();

        assert_eq!(snapshot.volume, Volume::new(80));
        assert_eq!(snapshot.position, 10.0);
        assert!(matches!(snapshot.order, SnapshotOrder::Timestamp(_)));

        let track = snapshot.current_track.as_ref().unwrap();
        assert_eq!(track.title, "t1");
        assert_eq!(track.duration_seconds, Some(180.0));

        let (kind, item) = snapshot.audible().unwrap();
        assert_eq!(kind, ChannelKind::Announcement);
        assert_eq!(item.source_url, "b.mp3");
    }

    #[test]
    fn test_sequence_preferred_over_timestamp() {
        let mut wire = wire();
        wire.sequence = Some(7);
        let snapshot = PlaybackSnapshot::try_from(wire).unwrap();
        assert_eq!(snapshot.order, SnapshotOrder::Sequence(7));
    }

    #[test]
    fn test_media_without_url_rejected() {
        let mut wire = wire();
        if let Some(track) = wire.current_track_data.as_mut() {
            track.file_url = None;
        }
        assert!(matches!(
            PlaybackSnapshot::try_from(wire),
            Err(PlaybackError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_order_comparison() {
        let early = SnapshotOrder::Sequence(1);
        let late = SnapshotOrder::Sequence(2);
        assert_eq!(late.compare(&early), Some(Ordering::Greater));
        assert_eq!(early.compare(&early), Some(Ordering::Equal));
        assert_eq!(SnapshotOrder::Unordered.compare(&late), None);
        assert_eq!(
            late.compare(&SnapshotOrder::Timestamp(Utc::now())),
            None
        );
    }

    #[test]
    fn test_paused_snapshot_has_nothing_audible() {
        let zone = ZoneId::parse(ZONE).unwrap();
        let mut snapshot = PlaybackSnapshot::playing_track(zone, MediaItem::new("t1", "a.mp3"), 0.0);
        assert!(snapshot.audible().is_some());

        snapshot.is_playing = false;
        assert!(snapshot.audible().is_none());
    }
}
