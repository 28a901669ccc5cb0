//! Type-safe sync2gear playback control API
//!
//! This crate describes every backend endpoint the playback client needs as
//! a stateless `ControlOperation` and executes them through
//! `Sync2gearClient`, which sits on the private `rest-client` crate.
//!
//! ```rust,ignore
//! use sync2gear_api::{ClientConfig, PlaySelection, Sync2gearClient};
//!
//! let client = Sync2gearClient::from_config(&ClientConfig::from_env())?;
//! let zone = "2f1c9a4e-0000-4000-8000-000000000001";
//!
//! client.play(zone, PlaySelection::Playlists(vec!["p1".into()]), true)?;
//! client.set_volume(zone, 40)?;
//! let state = client.playback_state(zone)?;
//! ```
//!
//! Control calls only acknowledge the request. The resulting playback state
//! is pushed on the realtime feed.

pub mod client;
pub mod config;
pub mod error;
pub mod operation;
pub mod operations;
pub mod wire;

pub use client::{PlaySelection, Sync2gearClient};
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use operation::{Acknowledgement, ControlOperation, HttpMethod, RetryPolicy};
pub use wire::{WireMedia, WireSnapshot, WireZone, DEFAULT_VOLUME};
