//! # sync2gear realtime feed
//!
//! A sync-first subscriber for the zone-scoped playback feed pushed by the
//! sync2gear backend over WebSocket.
//!
//! ## Overview
//!
//! All async work (handshake, keepalive, reconnect with backoff) runs in a
//! background worker thread with its own tokio runtime. Consumers select a
//! zone and iterate events; no async/await is required.
//!
//! ```rust,ignore
//! use sync2gear_stream::{FeedConfig, FeedEventKind, FeedSubscriber};
//!
//! let subscriber = FeedSubscriber::with_config(FeedConfig::new("wss://api.sync2gear.com/ws"))?;
//! let generation = subscriber.select_zone(zone_id, Some(&access_token))?;
//!
//! for event in subscriber.iter() {
//!     match event.kind {
//!         FeedEventKind::Snapshot(snapshot) => println!("{:?}", snapshot),
//!         FeedEventKind::Status(status) => println!("feed {}", status),
//!         FeedEventKind::Error(error) => eprintln!("{}", error),
//!     }
//! }
//! ```
//!
//! ## Guarantees
//!
//! - At most one connection is live. Selecting a zone cancels the previous
//!   zone's connection and waits for it to close before opening the next.
//! - Every event carries the generation of the selection that produced it.
//! - Consecutive connection failures back off exponentially; once the
//!   reconnect budget is spent the status becomes `Offline`.

pub mod config;
pub mod error;
pub mod event;
pub mod iter;
pub mod message;
pub mod subscriber;

mod connection;
mod worker;

pub use config::FeedConfig;
pub use error::{FeedError, Result};
pub use event::{ConnectionStatus, FeedEvent, FeedEventKind, Generation};
pub use iter::FeedIterator;
pub use subscriber::FeedSubscriber;

pub use sync2gear_api::WireSnapshot;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ConnectionStatus, FeedConfig, FeedError, FeedEvent, FeedEventKind, FeedIterator,
        FeedSubscriber, Generation, Result, WireSnapshot,
    };
}
