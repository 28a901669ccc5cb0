//! Transport controls
//!
//! Operator intents become backend requests scoped to the selected zone.
//! Requests are fire-and-forget: the dispatcher runs them on a worker thread
//! and reports each completion as a `TransportOutcome`. A success changes
//! nothing locally; the new state arrives with the next pushed snapshot.

use std::fmt;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sync2gear_api::{ApiError, PlaySelection, Sync2gearClient};
use thiserror::Error;

use crate::error::PlaybackError;
use crate::model::{Volume, ZoneId};

/// What to start playing
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSelection {
    Playlists(Vec<String>),
    MusicFiles(Vec<String>),
}

impl ContentSelection {
    fn is_empty(&self) -> bool {
        match self {
            ContentSelection::Playlists(ids) | ContentSelection::MusicFiles(ids) => ids.is_empty(),
        }
    }
}

impl From<ContentSelection> for PlaySelection {
    fn from(content: ContentSelection) -> Self {
        match content {
            ContentSelection::Playlists(ids) => PlaySelection::Playlists(ids),
            ContentSelection::MusicFiles(ids) => PlaySelection::MusicFiles(ids),
        }
    }
}

/// A discrete operator request
#[derive(Debug, Clone, PartialEq)]
pub enum TransportIntent {
    Start {
        content: ContentSelection,
        shuffle: bool,
    },
    /// Sent as a pause; the backend has no separate stop
    Stop,
    Pause,
    Resume,
    Next,
    Previous,
    SetVolume(Volume),
    Seek(f64),
}

impl TransportIntent {
    /// Reject intents the backend would refuse
    pub fn validate(&self) -> Result<(), PlaybackError> {
        match self {
            TransportIntent::Start { content, .. } if content.is_empty() => Err(
                PlaybackError::InvalidIntent("start needs at least one playlist or file".to_string()),
            ),
            TransportIntent::Seek(position) if !position.is_finite() || *position < 0.0 => {
                Err(PlaybackError::InvalidIntent(format!(
                    "cannot seek to {}",
                    position
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TransportIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportIntent::Start { .. } => f.write_str("start playback"),
            TransportIntent::Stop => f.write_str("stop"),
            TransportIntent::Pause => f.write_str("pause"),
            TransportIntent::Resume => f.write_str("resume"),
            TransportIntent::Next => f.write_str("skip to next"),
            TransportIntent::Previous => f.write_str("go to previous"),
            TransportIntent::SetVolume(volume) => write!(f, "set volume to {}", volume.value()),
            TransportIntent::Seek(position) => write!(f, "seek to {:.0}s", position),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Transport worker stopped")]
    WorkerStopped,

    #[error("Failed to start transport worker: {0}")]
    Spawn(String),
}

/// Something that can carry out transport intents for a zone
pub trait TransportBackend: Send + 'static {
    fn send(&self, zone_id: &ZoneId, intent: &TransportIntent) -> Result<(), TransportError>;
}

impl TransportBackend for Sync2gearClient {
    fn send(&self, zone_id: &ZoneId, intent: &TransportIntent) -> Result<(), TransportError> {
        let zone = zone_id.as_str();
        let ack = match intent {
            TransportIntent::Start { content, shuffle } => {
                self.play(zone, content.clone().into(), *shuffle)
            }
            TransportIntent::Stop | TransportIntent::Pause => self.pause(zone),
            TransportIntent::Resume => self.resume(zone),
            TransportIntent::Next => self.next(zone),
            TransportIntent::Previous => self.previous(zone),
            TransportIntent::SetVolume(volume) => self.set_volume(zone, volume.value()),
            TransportIntent::Seek(position) => self.seek(zone, *position),
        }?;

        if let Some(message) = ack.message {
            tracing::debug!("{} on zone {}: {}", intent, zone, message);
        }
        Ok(())
    }
}

/// Completion of one dispatched intent
#[derive(Debug)]
pub struct TransportOutcome {
    pub zone_id: ZoneId,
    pub intent: TransportIntent,
    pub result: Result<(), TransportError>,
}

impl TransportOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

struct Job {
    zone_id: ZoneId,
    intent: TransportIntent,
}

/// Runs transport requests off the caller's thread
///
/// Requests execute in dispatch order on a single worker thread.
pub struct TransportDispatcher {
    job_tx: Option<mpsc::Sender<Job>>,
    outcome_rx: mpsc::Receiver<TransportOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl TransportDispatcher {
    pub fn spawn<B: TransportBackend>(backend: B) -> Result<Self, TransportError> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (outcome_tx, outcome_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("sync2gear-transport".to_string())
            .spawn(move || {
                for Job { zone_id, intent } in job_rx {
                    let result = backend.send(&zone_id, &intent);
                    match &result {
                        Ok(()) => tracing::debug!("Requested {} on zone {}", intent, zone_id),
                        Err(e) => tracing::warn!("Could not {} on zone {}: {}", intent, zone_id, e),
                    }

                    let outcome = TransportOutcome {
                        zone_id,
                        intent,
                        result,
                    };
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
                tracing::debug!("Transport worker stopped");
            })
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        Ok(Self {
            job_tx: Some(job_tx),
            outcome_rx,
            worker: Some(worker),
        })
    }

    /// Queue an intent; the outcome is reported later
    pub fn dispatch(&self, zone_id: ZoneId, intent: TransportIntent) -> Result<(), TransportError> {
        let job_tx = self.job_tx.as_ref().ok_or(TransportError::WorkerStopped)?;
        job_tx
            .send(Job { zone_id, intent })
            .map_err(|_| TransportError::WorkerStopped)
    }

    pub fn try_outcome(&self) -> Option<TransportOutcome> {
        self.outcome_rx.try_recv().ok()
    }

    pub fn recv_outcome_timeout(&self, timeout: Duration) -> Option<TransportOutcome> {
        self.outcome_rx.recv_timeout(timeout).ok()
    }

    /// Outcomes available right now
    pub fn drain_outcomes(&self) -> Vec<TransportOutcome> {
        self.outcome_rx.try_iter().collect()
    }

    /// Stop accepting intents and wait for queued ones to finish
    pub fn shutdown(&mut self) {
        self.job_tx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Transport worker panicked");
            }
        }
    }
}

impl Drop for TransportDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingBackend {
        sent: Arc<Mutex<Vec<(ZoneId, TransportIntent)>>>,
        fail_next: bool,
    }

    impl TransportBackend for RecordingBackend {
        fn send(&self, zone_id: &ZoneId, intent: &TransportIntent) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push((zone_id.clone(), intent.clone()));
            if self.fail_next {
                return Err(ApiError::NetworkError("connection refused".to_string()).into());
            }
            Ok(())
        }
    }

    fn zone() -> ZoneId {
        ZoneId::parse("2f1c9a4e-0000-4000-8000-000000000001").unwrap()
    }

    #[test]
    fn test_dispatch_reports_outcomes_in_order() {
        let backend = RecordingBackend::default();
        let sent = Arc::clone(&backend.sent);
        let dispatcher = TransportDispatcher::spawn(backend).unwrap();

        dispatcher.dispatch(zone(), TransportIntent::Pause).unwrap();
        dispatcher.dispatch(zone(), TransportIntent::Next).unwrap();

        let first = dispatcher.recv_outcome_timeout(Duration::from_secs(2)).unwrap();
        let second = dispatcher.recv_outcome_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.intent, TransportIntent::Pause);
        assert_eq!(second.intent, TransportIntent::Next);
        assert!(first.is_success() && second.is_success());
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failure_reported_as_outcome() {
        let backend = RecordingBackend {
            fail_next: true,
            ..Default::default()
        };
        let dispatcher = TransportDispatcher::spawn(backend).unwrap();

        dispatcher.dispatch(zone(), TransportIntent::Resume).unwrap();
        let outcome = dispatcher.recv_outcome_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(
            outcome.result,
            Err(TransportError::Api(ApiError::NetworkError(_)))
        ));
    }

    #[test]
    fn test_dispatch_after_shutdown() {
        let mut dispatcher = TransportDispatcher::spawn(RecordingBackend::default()).unwrap();
        dispatcher.shutdown();
        assert!(matches!(
            dispatcher.dispatch(zone(), TransportIntent::Stop),
            Err(TransportError::WorkerStopped)
        ));
    }

    #[test]
    fn test_intent_validation() {
        assert!(TransportIntent::Seek(-1.0).validate().is_err());
        assert!(TransportIntent::Seek(f64::NAN).validate().is_err());
        assert!(TransportIntent::Seek(30.0).validate().is_ok());
        assert!(TransportIntent::Start {
            content: ContentSelection::Playlists(vec![]),
            shuffle: false
        }
        .validate()
        .is_err());
        assert_eq!(
            TransportIntent::SetVolume(Volume::new(40)).to_string(),
            "set volume to 40"
        );
    }
}
