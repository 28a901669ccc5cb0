//! Sync-first feed subscriber
//!
//! Provides a fully synchronous API for following one zone's playback feed.
//! All async work happens in a background worker thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::FeedConfig;
use crate::connection::{FeedTarget, StatusCell};
use crate::error::{FeedError, Result};
use crate::event::{ConnectionStatus, FeedEvent, Generation};
use crate::iter::FeedIterator;
use crate::message::feed_url;
use crate::worker::{spawn_feed_worker, Command};

/// Sync-first subscriber for the zone playback feed
///
/// At most one zone is followed at a time. Selecting a zone closes the
/// previous zone's connection before the new one is opened, and every event
/// carries the generation of the selection that produced it.
///
/// # Example
///
/// ```rust,ignore
/// use sync2gear_stream::{FeedConfig, FeedEventKind, FeedSubscriber};
///
/// let subscriber = FeedSubscriber::with_config(FeedConfig::new("wss://api.sync2gear.com/ws"))?;
/// let generation = subscriber.select_zone("2f1c9a4e-0000-4000-8000-000000000001", Some("token"))?;
///
/// for event in subscriber.iter() {
///     if event.generation != generation {
///         continue;
///     }
///     if let FeedEventKind::Snapshot(snapshot) = event.kind {
///         println!("playing: {}", snapshot.is_playing);
///     }
/// }
/// ```
pub struct FeedSubscriber {
    config: FeedConfig,

    /// Send commands to background worker
    command_tx: UnboundedSender<Command>,

    /// Receive events from background worker
    event_rx: Arc<Mutex<mpsc::Receiver<FeedEvent>>>,

    status: StatusCell,
    generation: AtomicU64,
    selected: RwLock<Option<String>>,
    worker: Option<JoinHandle<()>>,
}

impl FeedSubscriber {
    /// Create a subscriber for the given feed base URL with default settings
    pub fn new(ws_base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(FeedConfig::new(ws_base_url))
    }

    /// Create a subscriber with custom configuration
    pub fn with_config(config: FeedConfig) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();
        let status = StatusCell::new();

        let worker = spawn_feed_worker(config.clone(), command_rx, event_tx, status.clone())
            .map_err(|e| FeedError::Configuration(format!("failed to spawn feed worker: {}", e)))?;

        Ok(Self {
            config,
            command_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            status,
            generation: AtomicU64::new(0),
            selected: RwLock::new(None),
            worker: Some(worker),
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Follow a zone, replacing any previous selection
    ///
    /// Returns the generation tagged onto every event of this selection.
    pub fn select_zone(&self, zone_id: &str, access_token: Option<&str>) -> Result<Generation> {
        let generation = self.generation.load(Ordering::SeqCst) + 1;
        self.select_zone_as(zone_id, access_token, generation)
    }

    /// Follow a zone under a generation chosen by the caller
    ///
    /// For callers that keep their own selection counter. The generation must
    /// be newer than every previous one.
    ///
    /// Nothing is recorded unless the worker accepts the selection.
    pub fn select_zone_as(
        &self,
        zone_id: &str,
        access_token: Option<&str>,
        generation: Generation,
    ) -> Result<Generation> {
        let url = feed_url(&self.config.ws_base_url, zone_id, access_token)?;

        let previous = self.generation.load(Ordering::SeqCst);
        if generation <= previous {
            return Err(FeedError::Configuration(format!(
                "generation {} is not newer than {}",
                generation, previous
            )));
        }

        let zone_id = zone_id.trim().to_string();
        tracing::debug!("Selecting zone {} (generation {})", zone_id, generation);
        self.command_tx
            .send(Command::Select(FeedTarget {
                zone_id: zone_id.clone(),
                generation,
                url,
            }))
            .map_err(|_| FeedError::WorkerDisconnected)?;

        self.generation.fetch_max(generation, Ordering::SeqCst);
        self.status.advance(generation, ConnectionStatus::Disconnected);
        *self.selected.write() = Some(zone_id);

        Ok(generation)
    }

    /// Stop following the current zone
    ///
    /// Events still in flight from the old selection keep their old
    /// generation and are therefore recognizably stale.
    pub fn clear_zone(&self) -> Result<()> {
        self.command_tx
            .send(Command::Clear)
            .map_err(|_| FeedError::WorkerDisconnected)?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.advance(generation, ConnectionStatus::Disconnected);
        *self.selected.write() = None;
        Ok(())
    }

    /// Zone currently followed
    pub fn selected_zone(&self) -> Option<String> {
        self.selected.read().clone()
    }

    /// Generation of the latest selection
    pub fn generation(&self) -> Generation {
        self.generation.load(Ordering::SeqCst)
    }

    /// Connection status of the current selection
    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    /// Blocking iterator over feed events
    pub fn iter(&self) -> FeedIterator {
        FeedIterator::new(Arc::clone(&self.event_rx))
    }

    /// Close the connection and stop the worker thread
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Feed worker panicked during shutdown");
            }
        }
        self.status.reset(self.generation(), ConnectionStatus::Disconnected);
    }
}

impl Drop for FeedSubscriber {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONE: &str = "2f1c9a4e-0000-4000-8000-000000000001";

    fn unreachable() -> FeedConfig {
        FeedConfig::fast_retry("ws://127.0.0.1:1/ws")
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(FeedSubscriber::new("http://localhost/ws").is_err());
    }

    #[test]
    fn test_generations_increase() {
        let subscriber = FeedSubscriber::with_config(unreachable()).unwrap();
        assert_eq!(subscriber.generation(), 0);

        let first = subscriber.select_zone(ZONE, None).unwrap();
        let second = subscriber.select_zone(ZONE, None).unwrap();
        assert!(second > first);
        assert_eq!(subscriber.selected_zone().as_deref(), Some(ZONE));

        subscriber.clear_zone().unwrap();
        assert!(subscriber.generation() > second);
        assert!(subscriber.selected_zone().is_none());
    }

    #[test]
    fn test_pseudo_zone_rejected_without_side_effects() {
        let subscriber = FeedSubscriber::with_config(unreachable()).unwrap();
        let result = subscriber.select_zone("all-zones", None);

        assert!(matches!(result, Err(FeedError::InvalidZone(_))));
        assert_eq!(subscriber.generation(), 0);
        assert!(subscriber.selected_zone().is_none());
    }

    #[test]
    fn test_caller_generation_must_advance() {
        let subscriber = FeedSubscriber::with_config(unreachable()).unwrap();
        assert_eq!(subscriber.select_zone_as(ZONE, None, 5).unwrap(), 5);
        assert!(subscriber.select_zone_as(ZONE, None, 5).is_err());
        assert_eq!(subscriber.select_zone(ZONE, None).unwrap(), 6);
    }

    #[test]
    fn test_select_after_shutdown_records_nothing() {
        let mut subscriber = FeedSubscriber::with_config(unreachable()).unwrap();
        let generation = subscriber.select_zone(ZONE, None).unwrap();
        subscriber.clear_zone().unwrap();
        let cleared = subscriber.generation();
        subscriber.shutdown();

        let result = subscriber.select_zone_as(ZONE, None, generation + 10);
        assert!(matches!(result, Err(FeedError::WorkerDisconnected)));
        assert_eq!(subscriber.generation(), cleared);
        assert!(subscriber.selected_zone().is_none());

        assert!(subscriber.clear_zone().is_err());
        assert_eq!(subscriber.generation(), cleared);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut subscriber = FeedSubscriber::with_config(unreachable()).unwrap();
        subscriber.shutdown();
        subscriber.shutdown();
        assert_eq!(subscriber.status(), ConnectionStatus::Disconnected);
        assert!(subscriber.select_zone(ZONE, None).is_err());
    }
}
