//! JSON shapes the backend sends for playback state and zones
//!
//! These mirror the backend serializers field for field. They are shared by
//! the REST operations and the realtime feed, which pushes the same
//! playback-state object. Conversion into the validated playback model lives
//! in `sync2gear-playback`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Volume the backend assigns to a zone that never had one set
pub const DEFAULT_VOLUME: u8 = 70;

/// A playback-state object as serialized by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSnapshot {
    pub zone_id: String,

    #[serde(default)]
    pub zone_name: Option<String>,

    #[serde(default)]
    pub is_playing: bool,

    /// Elapsed seconds into the current item
    #[serde(default, deserialize_with = "lenient_f64")]
    pub position: f64,

    #[serde(default = "default_volume", deserialize_with = "lenient_volume")]
    pub volume: u8,

    #[serde(default)]
    pub queue_position: usize,

    #[serde(default)]
    pub current_track_data: Option<WireMedia>,

    #[serde(default)]
    pub current_announcement_data: Option<WireMedia>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    /// Monotonic counter, sent by backends that number their pushes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// A music file or announcement as embedded in a playback-state object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMedia {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub file_url: Option<String>,

    /// Length in seconds, absent while the backend is still probing the file
    #[serde(default)]
    pub duration: Option<f64>,
}

/// A zone as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireZone {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub floor_name: Option<String>,

    #[serde(default)]
    pub default_volume: Option<u8>,

    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default)]
    pub is_playing: Option<bool>,
}

fn default_volume() -> u8 {
    DEFAULT_VOLUME
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite()).unwrap_or(0.0))
}

/// Null becomes the default volume; out-of-range values are clamped
fn lenient_volume<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(match value {
        Some(v) => v.clamp(0, 100) as u8,
        None => DEFAULT_VOLUME,
    })
}
