//! Feed wire format
//!
//! Every frame is a JSON object tagged by `type`. The server sends
//! `playback_state` right after the handshake and `playback_update` on every
//! change, both with the state in `data` (possibly `null`). It answers a
//! client `ping` with `pong`.

use serde::Deserialize;
use sync2gear_api::WireSnapshot;
use uuid::Uuid;

use crate::error::{FeedError, Result};

/// A decoded server message
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Initial state sent on connect
    State(Option<WireSnapshot>),
    /// State pushed after a change
    Update(Option<WireSnapshot>),
    Pong,
    /// A message type this client does not handle
    Other(String),
}

impl FeedMessage {
    /// The snapshot carried by this message, if any
    pub fn into_snapshot(self) -> Option<WireSnapshot> {
        match self {
            FeedMessage::State(snapshot) | FeedMessage::Update(snapshot) => snapshot,
            FeedMessage::Pong | FeedMessage::Other(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one text frame
pub fn decode(text: &str) -> Result<FeedMessage> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| FeedError::Decode(e.to_string()))?;

    let snapshot = |data: serde_json::Value| -> Result<Option<WireSnapshot>> {
        if data.is_null() {
            return Ok(None);
        }
        serde_json::from_value(data)
            .map(Some)
            .map_err(|e| FeedError::Decode(e.to_string()))
    };

    match envelope.kind.as_str() {
        "playback_state" => Ok(FeedMessage::State(snapshot(envelope.data)?)),
        "playback_update" => Ok(FeedMessage::Update(snapshot(envelope.data)?)),
        "pong" => Ok(FeedMessage::Pong),
        _ => Ok(FeedMessage::Other(envelope.kind)),
    }
}

/// Keepalive frame sent by the client
pub fn ping() -> String {
    r#"{"type":"ping"}"#.to_string()
}

/// Check that a zone id can be subscribed to
pub fn validate_zone_id(zone_id: &str) -> Result<Uuid> {
    Uuid::parse_str(zone_id.trim()).map_err(|_| FeedError::InvalidZone(zone_id.to_string()))
}

/// Build `{base}/playback/{zone}/?token={token}`
pub fn feed_url(ws_base_url: &str, zone_id: &str, access_token: Option<&str>) -> Result<String> {
    let zone = validate_zone_id(zone_id)?;
    let base = ws_base_url.trim_end_matches('/');

    if !(base.starts_with("ws://") || base.starts_with("wss://")) {
        return Err(FeedError::InvalidUrl(base.to_string()));
    }

    let mut url = format!("{}/playback/{}/", base, zone.hyphenated());
    if let Some(token) = access_token.filter(|t| !t.is_empty()) {
        if !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(FeedError::InvalidUrl("access token is not URL-safe".to_string()));
        }
        url.push_str("?token=");
        url.push_str(token);
    }
    Ok(url)
}
