//! One zone's WebSocket connection, with reconnect and keepalive
//!
//! `run_feed` owns the connection for a single zone selection. It reconnects
//! with capped exponential backoff until the reconnect budget is spent or the
//! selection is cancelled, and forwards everything it learns as `FeedEvent`s.

use std::sync::{mpsc, Arc};

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::event::{ConnectionStatus, FeedEvent, FeedEventKind, Generation};
use crate::message::{self, FeedMessage};

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection status shared between the worker and the sync facade
///
/// Generations only move forward. Writes from a task whose generation is
/// older than the current one are ignored, so a cancelled connection can
/// never overwrite the status of its successor.
#[derive(Debug, Clone)]
pub(crate) struct StatusCell {
    inner: Arc<RwLock<(Generation, ConnectionStatus)>>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new((0, ConnectionStatus::Disconnected))),
        }
    }

    /// Overwrite generation and status
    pub(crate) fn reset(&self, generation: Generation, status: ConnectionStatus) {
        *self.inner.write() = (generation, status);
    }

    /// Start `generation` unless the worker already reported for it
    pub(crate) fn advance(&self, generation: Generation, status: ConnectionStatus) {
        let mut cell = self.inner.write();
        if generation > cell.0 {
            *cell = (generation, status);
        }
    }

    /// Update the status unless `generation` has been superseded
    pub(crate) fn set(&self, generation: Generation, status: ConnectionStatus) -> bool {
        let mut cell = self.inner.write();
        if generation < cell.0 {
            return false;
        }
        *cell = (generation, status);
        true
    }

    pub(crate) fn get(&self) -> ConnectionStatus {
        self.inner.read().1
    }
}

/// What to connect to
#[derive(Debug, Clone)]
pub(crate) struct FeedTarget {
    pub zone_id: String,
    pub generation: Generation,
    pub url: String,
}

/// Tags and forwards events for one selection
pub(crate) struct Emitter {
    zone_id: String,
    generation: Generation,
    events: mpsc::Sender<FeedEvent>,
    status: StatusCell,
    cancel: CancellationToken,
}

impl Emitter {
    pub(crate) fn new(
        target: &FeedTarget,
        events: mpsc::Sender<FeedEvent>,
        status: StatusCell,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            zone_id: target.zone_id.clone(),
            generation: target.generation,
            events,
            status,
            cancel,
        }
    }

    fn status(&self, status: ConnectionStatus) {
        if self.status.set(self.generation, status) {
            self.send(FeedEventKind::Status(status));
        }
    }

    fn error(&self, error: &FeedError) {
        self.send(FeedEventKind::Error(error.to_string()));
    }

    fn send(&self, kind: FeedEventKind) {
        let event = FeedEvent::new(self.zone_id.clone(), self.generation, kind);
        if self.events.send(event).is_err() {
            tracing::debug!("Feed event receiver dropped, stopping zone {}", self.zone_id);
            self.cancel.cancel();
        }
    }
}

enum SessionEnd {
    Cancelled,
    Closed(String),
    Failed(FeedError),
}

/// Run the feed for one zone selection until cancelled or offline
pub(crate) async fn run_feed(
    target: FeedTarget,
    config: FeedConfig,
    emitter: Emitter,
    cancel: CancellationToken,
) {
    let endpoint = redact(&target.url);
    let mut failures: u32 = 0;

    loop {
        emitter.status(ConnectionStatus::Connecting);
        tracing::debug!("Connecting feed for zone {} at {}", target.zone_id, endpoint);

        let handshake = tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(target.url.as_str()),
        );
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = handshake => result,
        };

        match connected {
            Ok(Ok((stream, _response))) => {
                failures = 0;
                tracing::info!("Feed connected for zone {}", target.zone_id);
                emitter.status(ConnectionStatus::Connected);

                match pump(stream, &config, &emitter, &cancel).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Closed(reason) => {
                        tracing::info!("Feed for zone {} closed: {}", target.zone_id, reason);
                    }
                    SessionEnd::Failed(error) => {
                        tracing::warn!("Feed for zone {} failed: {}", target.zone_id, error);
                        emitter.error(&error);
                    }
                }
            }
            Ok(Err(e)) => {
                let error = FeedError::Connect {
                    url: endpoint.clone(),
                    reason: e.to_string(),
                };
                tracing::warn!("{}", error);
                emitter.error(&error);
            }
            Err(_elapsed) => {
                let error = FeedError::Connect {
                    url: endpoint.clone(),
                    reason: format!("handshake timed out after {:?}", config.connect_timeout),
                };
                tracing::warn!("{}", error);
                emitter.error(&error);
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        failures += 1;
        if config.is_exhausted(failures) {
            tracing::warn!(
                "Feed for zone {} offline after {} consecutive failures",
                target.zone_id,
                failures
            );
            emitter.status(ConnectionStatus::Offline);
            return;
        }

        emitter.status(ConnectionStatus::Disconnected);
        let delay = config.retry_delay(failures);
        tracing::debug!("Reconnecting zone {} in {:?} (attempt {})", target.zone_id, delay, failures);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("Feed task for zone {} stopped", target.zone_id);
}

/// Read frames until the connection ends or the selection is cancelled
async fn pump(
    stream: FeedStream,
    config: &FeedConfig,
    emitter: &Emitter,
    cancel: &CancellationToken,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();
    let start = tokio::time::Instant::now() + config.ping_interval;
    let mut keepalive = tokio::time::interval_at(start, config.ping_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Cancelled;
            }
            _ = keepalive.tick() => {
                if let Err(e) = sink.send(Message::Text(message::ping())).await {
                    return SessionEnd::Failed(e.into());
                }
            }
            frame = source.next() => match frame {
                None => return SessionEnd::Closed("stream ended".to_string()),
                Some(Err(e)) => return SessionEnd::Failed(e.into()),
                Some(Ok(Message::Text(text))) => handle_text(&text, config, emitter),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return SessionEnd::Closed(reason);
                }
                Some(Ok(Message::Binary(bytes))) => {
                    tracing::debug!("Ignoring {} byte binary frame", bytes.len());
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

fn handle_text(text: &str, config: &FeedConfig, emitter: &Emitter) {
    if text.len() > config.max_message_bytes {
        let error = FeedError::Decode(format!(
            "message of {} bytes exceeds limit of {}",
            text.len(),
            config.max_message_bytes
        ));
        tracing::error!("Dropping feed message: {}", error);
        emitter.error(&error);
        return;
    }

    match message::decode(text) {
        Ok(FeedMessage::State(Some(snapshot))) | Ok(FeedMessage::Update(Some(snapshot))) => {
            emitter.send(FeedEventKind::Snapshot(snapshot));
        }
        Ok(FeedMessage::State(None)) | Ok(FeedMessage::Update(None)) => {
            tracing::debug!("Zone has no playback state yet");
        }
        Ok(FeedMessage::Pong) => tracing::trace!("pong"),
        Ok(FeedMessage::Other(kind)) => {
            tracing::debug!("Ignoring feed message of type {}", kind);
        }
        Err(error) => {
            tracing::warn!("Undecodable feed message: {}", error);
            emitter.error(&error);
        }
    }
}

/// Strip the query string so tokens never reach the logs
fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((path, _)) => format!("{}?<redacted>", path),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> FeedTarget {
        FeedTarget {
            zone_id: "z1".to_string(),
            generation: 2,
            url: "ws://localhost/ws/playback/z1/?token=secret".to_string(),
        }
    }

    #[test]
    fn test_status_cell_ignores_stale_generation() {
        let cell = StatusCell::new();
        cell.reset(2, ConnectionStatus::Connecting);

        assert!(!cell.set(1, ConnectionStatus::Offline));
        assert_eq!(cell.get(), ConnectionStatus::Connecting);

        assert!(cell.set(2, ConnectionStatus::Connected));
        assert_eq!(cell.get(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_status_cell_advance_keeps_earlier_report() {
        let cell = StatusCell::new();
        // The worker reports before the subscriber records the selection.
        assert!(cell.set(3, ConnectionStatus::Connected));
        cell.advance(3, ConnectionStatus::Disconnected);
        assert_eq!(cell.get(), ConnectionStatus::Connected);

        cell.advance(4, ConnectionStatus::Disconnected);
        assert_eq!(cell.get(), ConnectionStatus::Disconnected);
        assert!(!cell.set(3, ConnectionStatus::Connected));
    }

    #[test]
    fn test_redact_token() {
        assert_eq!(
            redact("ws://localhost/ws/playback/z1/?token=secret"),
            "ws://localhost/ws/playback/z1/?<redacted>"
        );
        assert_eq!(redact("ws://localhost/ws"), "ws://localhost/ws");
    }

    #[test]
    fn test_handle_text_forwards_snapshot() {
        let (tx, rx) = mpsc::channel();
        let cell = StatusCell::new();
        cell.reset(2, ConnectionStatus::Connected);
        let emitter = Emitter::new(&target(), tx, cell, CancellationToken::new());

        handle_text(
            r#"{"type": "playback_update", "data": {"zone_id": "z1", "is_playing": true}}"#,
            &FeedConfig::default(),
            &emitter,
        );
        handle_text(r#"{"type": "pong"}"#, &FeedConfig::default(), &emitter);

        let event = rx.try_recv().unwrap();
        assert!(event.belongs_to("z1", 2));
        assert!(matches!(event.kind, FeedEventKind::Snapshot(ref s) if s.is_playing));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_oversized_message_dropped() {
        let (tx, rx) = mpsc::channel();
        let emitter = Emitter::new(&target(), tx, StatusCell::new(), CancellationToken::new());
        let config = FeedConfig::default().with_max_message_bytes(16);

        handle_text(
            r#"{"type": "playback_update", "data": {"zone_id": "z1"}}"#,
            &config,
            &emitter,
        );

        let event = rx.try_recv().unwrap();
        assert!(matches!(event.kind, FeedEventKind::Error(ref e) if e.contains("exceeds")));
    }

    #[test]
    fn test_dropped_receiver_cancels() {
        let (tx, rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let emitter = Emitter::new(&target(), tx, StatusCell::new(), cancel.clone());
        drop(rx);

        emitter.send(FeedEventKind::Error("x".to_string()));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_stale_status_not_emitted() {
        let (tx, rx) = mpsc::channel();
        let cell = StatusCell::new();
        cell.reset(3, ConnectionStatus::Connecting);
        let emitter = Emitter::new(&target(), tx, cell, CancellationToken::new());

        emitter.status(ConnectionStatus::Connected);
        assert!(rx.try_recv().is_err());
    }
}
