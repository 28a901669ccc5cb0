//! # sync2gear playback
//!
//! Keeps a local two-channel audio pipeline (music and announcements)
//! consistent with the playback state the sync2gear backend pushes for one
//! zone, and sends operator transport requests back to the backend.
//!
//! ## Pieces
//!
//! - [`Reconciler`] turns each [`PlaybackSnapshot`] into load, seek, play and
//!   pause calls on two [`AudioChannel`]s. It never decides what plays next;
//!   when an item ends it asks the backend.
//! - [`SnapshotStore`] keeps the latest snapshot per zone and discards
//!   out-of-order ones.
//! - [`TransportDispatcher`] runs transport requests on a worker thread.
//! - [`PlaybackSession`] owns all of the above for the selected zone and is
//!   driven by feed events, audio events and a periodic tick.
//!
//! ```rust,ignore
//! use sync2gear_playback::prelude::*;
//!
//! let (music, _) = SimulatedChannel::auto_start(ChannelKind::Music);
//! let (announcements, _) = SimulatedChannel::auto_start(ChannelKind::Announcement);
//! let transport = TransportDispatcher::spawn(client)?;
//!
//! let mut session = PlaybackSession::new(music, announcements, transport, TracingSink);
//! let generation = session.select_zone(ZoneId::parse(zone_id)?);
//! subscriber.select_zone_as(zone_id, Some(&token), generation)?;
//!
//! for event in subscriber.iter() {
//!     session.handle_feed_event(event);
//! }
//! ```

pub mod channel;
pub mod error;
pub mod health;
pub mod logging;
pub mod model;
pub mod notice;
pub mod reconciler;
pub mod session;
pub mod simulated;
pub mod store;
pub mod transport;
pub mod zones;

pub use channel::{AudioChannel, AudioEvent, ChannelError, ChannelKind, OpTicket};
pub use error::{PlaybackError, Result};
pub use health::{FeedHealth, HealthTransition};
pub use model::{MediaItem, PlaybackSnapshot, SnapshotOrder, Volume, ZoneId};
pub use notice::{CollectingSink, Notice, NoticeLevel, NoticeScope, NoticeSink, TracingSink};
pub use reconciler::{
    DiscardReason, Effect, MusicBookkeeping, Reconciler, ReconcilerState, ResumePolicy,
};
pub use session::{PlaybackSession, SessionConfig};
pub use simulated::{ChannelOp, SimulatedChannel, SimulatedHandle};
pub use store::{ApplyOutcome, ChangeIterator, SnapshotStore, StoreChange, StoreChangeKind};
pub use transport::{
    ContentSelection, TransportBackend, TransportDispatcher, TransportError, TransportIntent,
    TransportOutcome,
};
pub use zones::{Zone, ZoneSelector};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AudioChannel, AudioEvent, ChannelKind, CollectingSink, ContentSelection, Effect,
        PlaybackError, PlaybackSession, PlaybackSnapshot, Reconciler, ResumePolicy,
        SessionConfig, SimulatedChannel, SnapshotStore, TracingSink, TransportDispatcher,
        TransportIntent, Volume, ZoneId, ZoneSelector,
    };
}
