//! Audio output seam
//!
//! The reconciler drives two `AudioChannel`s and learns about asynchronous
//! outcomes (start completed, item ended, decode error) through `AudioEvent`s
//! fed back to it. Nothing here decodes audio.

use std::fmt;

use serde::Serialize;
use sync2gear_stream::Generation;
use thiserror::Error;

/// The two independent audio paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChannelKind {
    Music,
    Announcement,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Music => f.write_str("music"),
            ChannelKind::Announcement => f.write_str("announcement"),
        }
    }
}

/// Identifies one in-flight start on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpTicket {
    pub generation: Generation,
    pub channel: ChannelKind,
    pub seq: u64,
}

/// Failures of an audio output
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("playback error: {0}")]
    Playback(String),
}

/// Asynchronous notifications from an audio output
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// The start identified by the ticket is audible
    Started(OpTicket),
    /// The start identified by the ticket failed
    Failed { ticket: OpTicket, error: ChannelError },
    /// The item started under the ticket played to its end
    Ended(OpTicket),
    /// The item started under the ticket failed after it started
    Error { ticket: OpTicket, error: ChannelError },
}

impl AudioEvent {
    /// The start this event belongs to
    pub fn ticket(&self) -> OpTicket {
        match self {
            AudioEvent::Started(ticket) | AudioEvent::Ended(ticket) => *ticket,
            AudioEvent::Failed { ticket, .. } | AudioEvent::Error { ticket, .. } => *ticket,
        }
    }
}

/// One audio output owned by the reconciler
///
/// `play` only begins a start; its outcome is reported later as
/// `AudioEvent::Started` or `AudioEvent::Failed` carrying the same ticket.
/// Every other call takes effect immediately.
pub trait AudioChannel {
    /// Replace the loaded source
    fn load(&mut self, url: &str) -> Result<(), ChannelError>;

    /// Begin playback of the loaded source
    fn play(&mut self, ticket: OpTicket) -> Result<(), ChannelError>;

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64) -> Result<(), ChannelError>;

    /// Output gain, 0.0 to 1.0
    fn set_volume(&mut self, gain: f32);

    /// Current playback position in seconds
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;
}

impl<C: AudioChannel + ?Sized> AudioChannel for Box<C> {
    fn load(&mut self, url: &str) -> Result<(), ChannelError> {
        (**self).load(url)
    }

    fn play(&mut self, ticket: OpTicket) -> Result<(), ChannelError> {
        (**self).play(ticket)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, seconds: f64) -> Result<(), ChannelError> {
        (**self).seek(seconds)
    }

    fn set_volume(&mut self, gain: f32) {
        (**self).set_volume(gain)
    }

    fn position(&self) -> f64 {
        (**self).position()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_identity() {
        let a = OpTicket {
            generation: 1,
            channel: ChannelKind::Music,
            seq: 1,
        };
        let b = OpTicket { seq: 2, ..a };
        assert_ne!(a, b);
        assert_eq!(a, OpTicket { ..a });
    }

    #[test]
    fn test_event_ticket() {
        let ticket = OpTicket {
            generation: 3,
            channel: ChannelKind::Music,
            seq: 7,
        };
        assert_eq!(AudioEvent::Ended(ticket).ticket(), ticket);
        let error = AudioEvent::Error {
            ticket,
            error: ChannelError::Network("reset".to_string()),
        };
        assert_eq!(error.ticket(), ticket);
    }

    #[test]
    fn test_error_display() {
        let error = ChannelError::Load {
            url: "a.mp3".to_string(),
            reason: "404".to_string(),
        };
        assert_eq!(error.to_string(), "failed to load a.mp3: 404");
        assert_eq!(ChannelKind::Announcement.to_string(), "announcement");
    }
}
