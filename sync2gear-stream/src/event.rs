//! Events delivered by the feed subscriber

use std::fmt;

use sync2gear_api::WireSnapshot;

/// Identity of one zone selection
///
/// Incremented on every `select_zone`. Events carry the generation of the
/// selection that produced them so consumers can drop late arrivals from a
/// previous zone.
pub type Generation = u64;

/// Connectivity of the feed for the selected zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// No zone selected, or the connection dropped and a retry is pending
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Receiving updates
    Connected,
    /// Reconnect budget exhausted; selecting the zone again retries
    Offline,
}

impl ConnectionStatus {
    /// Whether updates are flowing
    pub fn is_live(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// An event for one zone selection
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub zone_id: String,
    pub generation: Generation,
    pub kind: FeedEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEventKind {
    /// A playback-state push, either the initial state or an update
    Snapshot(WireSnapshot),
    /// The connection status changed
    Status(ConnectionStatus),
    /// A non-fatal feed error (failed handshake, undecodable message)
    Error(String),
}

impl FeedEvent {
    pub fn new(zone_id: impl Into<String>, generation: Generation, kind: FeedEventKind) -> Self {
        Self {
            zone_id: zone_id.into(),
            generation,
            kind,
        }
    }

    /// Whether this event belongs to the given selection
    pub fn belongs_to(&self, zone_id: &str, generation: Generation) -> bool {
        self.generation == generation && self.zone_id == zone_id
    }
}
