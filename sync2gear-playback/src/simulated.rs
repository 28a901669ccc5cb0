//! In-memory audio channel
//!
//! `SimulatedChannel` keeps the state a real output would have (loaded
//! source, position, playing flag, gain) and logs every call. Its
//! `SimulatedHandle` plays the role of the device: it completes or fails
//! pending starts, ends items, advances time and exposes the call log.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{AudioChannel, AudioEvent, ChannelError, ChannelKind, OpTicket};

/// One call made on a channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelOp {
    Load(String),
    Play(OpTicket),
    Pause,
    Seek(f64),
    SetVolume(f32),
}

#[derive(Debug)]
struct Inner {
    kind: ChannelKind,
    loaded: Option<String>,
    position: f64,
    playing: bool,
    gain: f32,
    pending: Option<OpTicket>,
    last_ticket: Option<OpTicket>,
    auto_start: bool,
    failing_urls: HashSet<String>,
    ops: Vec<ChannelOp>,
    outbox: VecDeque<AudioEvent>,
}

/// An audio channel with no audio
#[derive(Debug)]
pub struct SimulatedChannel {
    inner: Arc<Mutex<Inner>>,
}

/// Device-side control of a `SimulatedChannel`
#[derive(Debug, Clone)]
pub struct SimulatedHandle {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedChannel {
    /// A channel whose starts stay pending until the handle completes them
    pub fn new(kind: ChannelKind) -> (Self, SimulatedHandle) {
        Self::build(kind, false)
    }

    /// A channel whose starts complete immediately
    ///
    /// The `Started` event is queued on the handle's outbox.
    pub fn auto_start(kind: ChannelKind) -> (Self, SimulatedHandle) {
        Self::build(kind, true)
    }

    fn build(kind: ChannelKind, auto_start: bool) -> (Self, SimulatedHandle) {
        let inner = Arc::new(Mutex::new(Inner {
            kind,
            loaded: None,
            position: 0.0,
            playing: false,
            gain: 1.0,
            pending: None,
            last_ticket: None,
            auto_start,
            failing_urls: HashSet::new(),
            ops: Vec::new(),
            outbox: VecDeque::new(),
        }));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            SimulatedHandle { inner },
        )
    }
}

impl AudioChannel for SimulatedChannel {
    fn load(&mut self, url: &str) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();
        inner.ops.push(ChannelOp::Load(url.to_string()));
        tracing::info!("[{}] load {}", inner.kind, url);

        inner.playing = false;
        inner.position = 0.0;
        if inner.failing_urls.contains(url) {
            inner.loaded = None;
            return Err(ChannelError::Load {
                url: url.to_string(),
                reason: "source unavailable".to_string(),
            });
        }
        inner.loaded = Some(url.to_string());
        Ok(())
    }

    fn play(&mut self, ticket: OpTicket) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();
        inner.ops.push(ChannelOp::Play(ticket));
        tracing::info!("[{}] play at {:.1}s", inner.kind, inner.position);

        if inner.loaded.is_none() {
            return Err(ChannelError::Playback("nothing loaded".to_string()));
        }

        inner.last_ticket = Some(ticket);
        if inner.auto_start {
            inner.playing = true;
            inner.outbox.push_back(AudioEvent::Started(ticket));
        } else {
            inner.pending = Some(ticket);
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut inner = self.inner.lock();
        inner.ops.push(ChannelOp::Pause);
        if inner.playing {
            tracing::info!("[{}] pause at {:.1}s", inner.kind, inner.position);
        }
        inner.playing = false;
    }

    fn seek(&mut self, seconds: f64) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();
        inner.ops.push(ChannelOp::Seek(seconds));
        tracing::info!("[{}] seek {:.1}s", inner.kind, seconds);
        inner.position = seconds.max(0.0);
        Ok(())
    }

    fn set_volume(&mut self, gain: f32) {
        let mut inner = self.inner.lock();
        inner.ops.push(ChannelOp::SetVolume(gain));
        if (inner.gain - gain).abs() > f32::EPSILON {
            tracing::info!("[{}] volume {:.2}", inner.kind, gain);
        }
        inner.gain = gain;
    }

    fn position(&self) -> f64 {
        self.inner.lock().position
    }

    fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }
}

impl SimulatedHandle {
    /// Complete the pending start
    pub fn complete_start(&self) -> Option<AudioEvent> {
        let mut inner = self.inner.lock();
        let ticket = inner.pending.take()?;
        inner.playing = true;
        Some(AudioEvent::Started(ticket))
    }

    /// Fail the pending start
    pub fn fail_start(&self, error: ChannelError) -> Option<AudioEvent> {
        let mut inner = self.inner.lock();
        let ticket = inner.pending.take()?;
        inner.playing = false;
        Some(AudioEvent::Failed { ticket, error })
    }

    /// Play the loaded item to its end
    pub fn finish(&self) -> Option<AudioEvent> {
        let mut inner = self.inner.lock();
        let ticket = inner.last_ticket?;
        inner.playing = false;
        Some(AudioEvent::Ended(ticket))
    }

    /// Fail the item that is playing
    pub fn fail_playback(&self, error: ChannelError) -> Option<AudioEvent> {
        let mut inner = self.inner.lock();
        let ticket = inner.last_ticket?;
        inner.playing = false;
        Some(AudioEvent::Error { ticket, error })
    }

    /// Advance the playhead if playing
    pub fn advance(&self, seconds: f64) {
        let mut inner = self.inner.lock();
        if inner.playing {
            inner.position += seconds;
        }
    }

    /// Make loads of `url` fail
    pub fn fail_loads_of(&self, url: impl Into<String>) {
        self.inner.lock().failing_urls.insert(url.into());
    }

    /// Drain events queued by auto-started channels
    pub fn drain_events(&self) -> Vec<AudioEvent> {
        self.inner.lock().outbox.drain(..).collect()
    }

    pub fn pending_start(&self) -> Option<OpTicket> {
        self.inner.lock().pending
    }

    pub fn ops(&self) -> Vec<ChannelOp> {
        self.inner.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.inner.lock().ops.clear();
    }

    pub fn loaded(&self) -> Option<String> {
        self.inner.lock().loaded.clone()
    }

    pub fn position(&self) -> f64 {
        self.inner.lock().position
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }

    pub fn gain(&self) -> f32 {
        self.inner.lock().gain
    }

    /// Number of loads and seeks, the calls that restart audio
    pub fn restarts(&self) -> usize {
        self.inner
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, ChannelOp::Load(_) | ChannelOp::Seek(_)))
            .count()
    }
}
