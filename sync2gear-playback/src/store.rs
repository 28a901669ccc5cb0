//! Latest-known playback state per zone
//!
//! The store keeps the most recent applied snapshot and the feed connection
//! status of each zone. Snapshots are applied in arrival order; one whose
//! order key is older than the last applied one is discarded. Disconnects
//! only change the status, so the last-known snapshot survives them.
//!
//! Consumers that want to react to changes `watch` a zone and read change
//! events from `iter()`:
//!
//! ```rust,ignore
//! store.watch(zone.clone());
//! for change in store.iter().try_iter() {
//!     if let Some(snapshot) = store.latest(&change.zone_id) {
//!         println!("{} playing: {}", change.zone_id, snapshot.is_playing);
//!     }
//! }
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use sync2gear_stream::ConnectionStatus;

use crate::model::{PlaybackSnapshot, ZoneId};

/// Result of offering a snapshot to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot is now the latest for its zone
    Applied,
    /// Same order key as the latest; ignored
    Duplicate,
    /// Older than the latest; ignored
    Stale,
}

impl ApplyOutcome {
    pub fn is_applied(self) -> bool {
        self == ApplyOutcome::Applied
    }
}

/// What changed on a watched zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChangeKind {
    Snapshot,
    Status(ConnectionStatus),
}

#[derive(Debug, Clone)]
pub struct StoreChange {
    pub zone_id: ZoneId,
    pub kind: StoreChangeKind,
    pub timestamp: Instant,
}

impl PartialEq for StoreChange {
    fn eq(&self, other: &Self) -> bool {
        self.zone_id == other.zone_id && self.kind == other.kind
    }
}

#[derive(Debug, Default)]
struct ZoneEntry {
    latest: Option<PlaybackSnapshot>,
    status: Option<ConnectionStatus>,
}

/// Snapshot and status storage keyed by zone
pub struct SnapshotStore {
    zones: RwLock<HashMap<ZoneId, ZoneEntry>>,
    watched: RwLock<HashSet<ZoneId>>,
    change_tx: mpsc::Sender<StoreChange>,
    change_rx: Arc<Mutex<mpsc::Receiver<StoreChange>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (change_tx, change_rx) = mpsc::channel();
        Self {
            zones: RwLock::new(HashMap::new()),
            watched: RwLock::new(HashSet::new()),
            change_tx,
            change_rx: Arc::new(Mutex::new(change_rx)),
        }
    }

    /// Offer a snapshot, keeping it only if it is newer than the latest
    pub fn apply(&self, snapshot: PlaybackSnapshot) -> ApplyOutcome {
        let zone_id = snapshot.zone_id.clone();
        let outcome = {
            let mut zones = self.zones.write();
            let entry = zones.entry(zone_id.clone()).or_default();

            let ordering = entry
                .latest
                .as_ref()
                .and_then(|last| snapshot.order.compare(&last.order));

            match ordering {
                Some(Ordering::Less) => ApplyOutcome::Stale,
                Some(Ordering::Equal) => ApplyOutcome::Duplicate,
                Some(Ordering::Greater) | None => {
                    entry.latest = Some(snapshot);
                    ApplyOutcome::Applied
                }
            }
        };

        match outcome {
            ApplyOutcome::Applied => self.emit(&zone_id, StoreChangeKind::Snapshot),
            ApplyOutcome::Stale => tracing::debug!("Discarded out-of-order snapshot for {}", zone_id),
            ApplyOutcome::Duplicate => tracing::trace!("Duplicate snapshot for {}", zone_id),
        }
        outcome
    }

    pub fn latest(&self, zone_id: &ZoneId) -> Option<PlaybackSnapshot> {
        self.zones.read().get(zone_id)?.latest.clone()
    }

    /// Record the feed status; the latest snapshot is kept
    pub fn set_status(&self, zone_id: &ZoneId, status: ConnectionStatus) {
        let changed = {
            let mut zones = self.zones.write();
            let entry = zones.entry(zone_id.clone()).or_default();
            let changed = entry.status != Some(status);
            entry.status = Some(status);
            changed
        };

        if changed {
            self.emit(zone_id, StoreChangeKind::Status(status));
        }
    }

    pub fn status(&self, zone_id: &ZoneId) -> Option<ConnectionStatus> {
        self.zones.read().get(zone_id)?.status
    }

    /// Register interest in a zone's changes
    pub fn watch(&self, zone_id: ZoneId) {
        self.watched.write().insert(zone_id);
    }

    pub fn unwatch(&self, zone_id: &ZoneId) {
        self.watched.write().remove(zone_id);
    }

    pub fn is_watched(&self, zone_id: &ZoneId) -> bool {
        self.watched.read().contains(zone_id)
    }

    /// Blocking iterator over changes of watched zones
    pub fn iter(&self) -> ChangeIterator {
        ChangeIterator {
            rx: Arc::clone(&self.change_rx),
        }
    }

    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.zones.read().keys().cloned().collect()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.zone_count() == 0
    }

    /// Forget a zone, returning whether it was known
    pub fn remove_zone(&self, zone_id: &ZoneId) -> bool {
        self.zones.write().remove(zone_id).is_some()
    }

    pub fn clear(&self) {
        self.zones.write().clear();
    }

    fn emit(&self, zone_id: &ZoneId, kind: StoreChangeKind) {
        if !self.is_watched(zone_id) {
            return;
        }
        let change = StoreChange {
            zone_id: zone_id.clone(),
            kind,
            timestamp: Instant::now(),
        };
        // The receiver lives as long as the store.
        let _ = self.change_tx.send(change);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("zone_count", &self.zone_count())
            .finish()
    }
}

/// Blocking iterator over store changes
///
/// Clones share one queue; each change is delivered to one reader.
#[derive(Clone)]
pub struct ChangeIterator {
    rx: Arc<Mutex<mpsc::Receiver<StoreChange>>>,
}

impl ChangeIterator {
    pub fn recv(&self) -> Option<StoreChange> {
        self.rx.lock().recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<StoreChange> {
        self.rx.lock().recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<StoreChange> {
        self.rx.lock().try_recv().ok()
    }

    /// Changes available right now
    pub fn try_iter(&self) -> impl Iterator<Item = StoreChange> + '_ {
        std::iter::from_fn(move || self.try_recv())
    }
}

impl Iterator for ChangeIterator {
    type Item = StoreChange;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}
